use super::model::BackupLinkRecord;
use crate::error::Result;
use crate::store::{JsonStore, RecordStore, StoreSnapshot};
use serde_json::Value;
use std::path::Path;
use tracing::warn;

/// 备份链接存储：id -> BackupLinkRecord
#[derive(Debug, Clone)]
pub struct BackupLinkStore {
    inner: JsonStore,
}

impl BackupLinkStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            inner: JsonStore::new(path)?,
        })
    }

    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// 获取单条记录，记录损坏时返回配置错误
    pub fn get(&self, id: &str) -> Result<Option<BackupLinkRecord>> {
        match self.inner.get(id)? {
            Some(value) => Ok(Some(decode_record(id, value)?)),
            None => Ok(None),
        }
    }

    /// 写入（新增或覆盖）一条记录
    pub fn insert(&self, record: &BackupLinkRecord) -> Result<()> {
        let value = serde_json::to_value(record)?;
        self.inner.set(&record.id, value)
    }

    /// 删除记录，返回被删除的记录
    pub fn remove(&self, id: &str) -> Result<Option<BackupLinkRecord>> {
        match self.inner.delete(id)? {
            Some(value) => Ok(decode_record(id, value).ok()),
            None => Ok(None),
        }
    }

    /// 在一次读-改-写中修改记录；记录不存在时不做任何写入并返回 None
    pub fn modify<F>(&self, id: &str, f: F) -> Result<Option<BackupLinkRecord>>
    where
        F: FnOnce(&mut BackupLinkRecord),
    {
        self.inner.update(|map| {
            let Some(value) = map.get(id).cloned() else {
                return Ok(None);
            };

            let mut record = decode_record(id, value)?;
            f(&mut record);
            map.insert(id.to_string(), serde_json::to_value(&record)?);
            Ok(Some(record))
        })
    }
}

impl RecordStore for BackupLinkStore {
    /// 逐条解码，损坏的记录被跳过并记录警告，不影响其他记录
    fn read_snapshot(&self) -> Result<StoreSnapshot> {
        let mut snapshot = StoreSnapshot::default();

        for (id, value) in self.inner.load()? {
            match decode_record(&id, value) {
                Ok(record) => {
                    snapshot.records.insert(id, record);
                }
                Err(e) => {
                    warn!(id = %id, error = %e, "跳过无法解析的备份链接记录");
                    snapshot.invalid.insert(id);
                }
            }
        }

        Ok(snapshot)
    }
}

fn decode_record(id: &str, value: Value) -> Result<BackupLinkRecord> {
    let mut record: BackupLinkRecord = serde_json::from_value(value)?;
    record.id = id.to_string();
    Ok(record)
}
