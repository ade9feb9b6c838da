use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 备份链接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BackupLinkStatus {
    /// 等待下一次执行，没有进程在运行
    Pending,
    /// 工作进程正在执行备份
    Active,
}

impl BackupLinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupLinkStatus::Pending => "PENDING",
            BackupLinkStatus::Active => "ACTIVE",
        }
    }
}

impl fmt::Display for BackupLinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 备份链接记录
///
/// 存储文件中的字段名沿用 camelCase，`processPID` 单独重命名。
/// `id` 同时是存储文件中的键，解码时以键为准。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupLinkRecord {
    #[serde(default)]
    pub id: String,
    pub status: BackupLinkStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_backup_timestamp: Option<i64>,
    pub job_frequence_ms: String,
    #[serde(rename = "processPID", default, skip_serializing_if = "Option::is_none")]
    pub process_pid: Option<u32>,
    pub storage_id: String,
    pub bucket: String,
    pub local_dir_path: String,
    pub link_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

impl BackupLinkRecord {
    /// 根据添加参数创建一条新的 PENDING 记录
    pub fn from_params(id: String, params: AddBackupLinkParams) -> Self {
        Self {
            id,
            status: BackupLinkStatus::Pending,
            last_backup_timestamp: None,
            job_frequence_ms: params.job_frequence_ms,
            process_pid: None,
            storage_id: params.storage_id,
            bucket: params.bucket,
            local_dir_path: params.local_dir_path,
            link_name: params.link_name,
            prefix: params.prefix.filter(|p| !p.trim().is_empty()),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == BackupLinkStatus::Active
    }

    pub fn is_pending(&self) -> bool {
        self.status == BackupLinkStatus::Pending
    }

    /// 相对于上一次观察到的记录，本记录是否表示一次执行已经完成
    ///
    /// 之前为 ACTIVE，现在 `lastBackupTimestamp` 被刷新，
    /// 并且状态回到 PENDING 或者进程号已被清除。
    pub fn completed_since(&self, previous: &BackupLinkRecord) -> bool {
        previous.is_active() && self.finished_since(previous)
    }

    /// 时间戳前进并且没有工作进程在运行
    ///
    /// 不要求上一次观察到 ACTIVE：执行很短时，两次读取之间只能看到
    /// PENDING 的时间戳前进。
    pub fn finished_since(&self, previous: &BackupLinkRecord) -> bool {
        let refreshed = match (previous.last_backup_timestamp, self.last_backup_timestamp) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(before), Some(now)) => now > before,
        };

        refreshed && (self.is_pending() || self.process_pid.is_none())
    }
}

/// 添加备份链接的参数
#[derive(Debug, Clone)]
pub struct AddBackupLinkParams {
    pub storage_id: String,
    pub bucket: String,
    pub local_dir_path: String,
    pub job_frequence_ms: String,
    pub link_name: String,
    pub prefix: Option<String>,
}

/// 某一时刻存储中全部备份链接的快照，按ID有序
pub type Snapshot = BTreeMap<String, BackupLinkRecord>;
