use crate::error::{CtcError, Result};
use crate::store::JsonStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

/// 对象存储配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageRecord {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub endpoint: String,
    pub created_at: DateTime<Utc>,
}

impl StorageRecord {
    pub fn endpoint(&self) -> StorageEndpoint {
        StorageEndpoint::parse(&self.endpoint)
    }
}

/// 存储端点
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageEndpoint {
    /// `file://` 端点，对象以文件形式保存在本地目录中
    Local(PathBuf),
    /// 其他远端对象存储
    Remote(String),
}

impl StorageEndpoint {
    pub fn parse(endpoint: &str) -> Self {
        match endpoint.trim().strip_prefix("file://") {
            Some(path) => StorageEndpoint::Local(PathBuf::from(path)),
            None => StorageEndpoint::Remote(endpoint.trim().to_string()),
        }
    }
}

/// 存储状态检查结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStatus {
    pub storage_name: String,
    /// 当前版本能否向该端点传输数据
    pub endpoint_supported: bool,
    /// 端点是否可以访问
    pub is_online: bool,
}

/// 存储管理
#[derive(Debug, Clone)]
pub struct StorageService {
    store: JsonStore,
}

impl StorageService {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            store: JsonStore::new(path)?,
        })
    }

    /// 列出全部存储，按名称排序
    pub fn list(&self) -> Result<Vec<StorageRecord>> {
        let mut storages = Vec::new();
        for (id, value) in self.store.load()? {
            match serde_json::from_value::<StorageRecord>(value) {
                Ok(mut record) => {
                    record.id = id;
                    storages.push(record);
                }
                Err(e) => warn!(id = %id, error = %e, "跳过无法解析的存储记录"),
            }
        }
        storages.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(storages)
    }

    pub fn list_names(&self) -> Result<Vec<String>> {
        Ok(self.list()?.into_iter().map(|s| s.name).collect())
    }

    pub fn get(&self, id: &str) -> Result<Option<StorageRecord>> {
        Ok(self.list()?.into_iter().find(|s| s.id == id))
    }

    /// 根据名称查找存储ID
    pub fn name_to_id(&self, name: &str) -> Result<String> {
        self.list()?
            .into_iter()
            .find(|s| s.name == name)
            .map(|s| s.id)
            .ok_or_else(|| CtcError::not_found(format!("存储 '{name}'")))
    }

    /// 新增存储，名称必须唯一
    pub fn add(&self, name: &str, endpoint: &str) -> Result<StorageRecord> {
        let name = name.trim();
        let endpoint = endpoint.trim();
        if name.is_empty() || endpoint.is_empty() {
            return Err(CtcError::config("存储名称和端点不能为空"));
        }

        let record = StorageRecord {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&record)?;

        self.store.update(|map| {
            let duplicated = map
                .values()
                .any(|v| v.get("name").and_then(|n| n.as_str()) == Some(name));
            if duplicated {
                return Err(CtcError::config(format!("存储名称已存在: {name}")));
            }
            map.insert(record.id.clone(), value);
            Ok(())
        })?;

        info!(storage = %record.name, id = %record.id, "存储已添加");
        Ok(record)
    }

    pub fn remove(&self, id: &str) -> Result<bool> {
        let removed = self.store.delete(id)?.is_some();
        if removed {
            info!(id = %id, "存储已删除");
        }
        Ok(removed)
    }

    /// 检查存储端点状态
    pub fn check_status(&self, record: &StorageRecord) -> StorageStatus {
        let (endpoint_supported, is_online) = match record.endpoint() {
            StorageEndpoint::Local(dir) => (true, dir_is_writable(&dir)),
            StorageEndpoint::Remote(_) => (false, false),
        };

        StorageStatus {
            storage_name: record.name.clone(),
            endpoint_supported,
            is_online,
        }
    }
}

fn dir_is_writable(dir: &Path) -> bool {
    match fs::metadata(dir) {
        Ok(meta) => meta.is_dir() && !meta.permissions().readonly(),
        Err(_) => false,
    }
}
