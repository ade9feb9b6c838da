// 记录存储模块
//
// - JsonStore: 单文件 JSON 键值存储，多个进程共享
// - RecordStore: 编排器读取备份链接快照的边界
// - StoreWatcher: 轮询存储并以通道形式推送变更快照

mod json_store;
mod watcher;

pub use json_store::JsonStore;
pub use watcher::StoreWatcher;

use crate::backup_link::Snapshot;
use crate::error::Result;
use std::collections::BTreeSet;

/// 一次读取存储的结果
///
/// 无法解析的记录不会出现在 `records` 中，它们的ID单独列在 `invalid` 里，
/// 订阅方据此区分"记录被删除"和"记录暂时无法解析"。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub records: Snapshot,
    pub invalid: BTreeSet<String>,
}

impl From<Snapshot> for StoreSnapshot {
    fn from(records: Snapshot) -> Self {
        Self {
            records,
            invalid: BTreeSet::new(),
        }
    }
}

/// 备份链接记录存储
pub trait RecordStore: Send + Sync {
    /// 读取全部可以解析的备份链接
    fn read_all(&self) -> Result<Snapshot> {
        Ok(self.read_snapshot()?.records)
    }

    /// 读取全部备份链接，同时报告无法解析的ID
    fn read_snapshot(&self) -> Result<StoreSnapshot>;
}
