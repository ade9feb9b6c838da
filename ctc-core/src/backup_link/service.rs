use super::frequency::{compute_wait_time, parse_frequency};
use super::mirror::{build_upload_plan, uploader_for};
use super::model::{AddBackupLinkParams, BackupLinkRecord, BackupLinkStatus};
use super::store::BackupLinkStore;
use crate::error::{CtcError, Result};
use crate::storage::StorageService;
use crate::store::RecordStore;
use chrono::Utc;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// 一次备份执行的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupSummary {
    pub files: usize,
    pub bytes: u64,
}

/// 备份链接管理
#[derive(Debug, Clone)]
pub struct BackupLinkService {
    links: BackupLinkStore,
    storages: StorageService,
}

impl BackupLinkService {
    pub fn new(links: BackupLinkStore, storages: StorageService) -> Self {
        Self { links, storages }
    }

    pub fn store(&self) -> &BackupLinkStore {
        &self.links
    }

    /// 列出全部备份链接，按名称排序
    pub fn list(&self) -> Result<Vec<BackupLinkRecord>> {
        let mut links: Vec<_> = self.links.read_all()?.into_values().collect();
        links.sort_by(|a, b| a.link_name.cmp(&b.link_name));
        Ok(links)
    }

    pub fn list_names(&self) -> Result<Vec<String>> {
        Ok(self.list()?.into_iter().map(|l| l.link_name).collect())
    }

    /// 根据名称查找备份链接ID
    pub fn name_to_id(&self, name: &str) -> Result<String> {
        self.list()?
            .into_iter()
            .find(|l| l.link_name == name)
            .map(|l| l.id)
            .ok_or_else(|| CtcError::not_found(format!("备份链接 '{name}'")))
    }

    /// 新增备份链接，初始状态为 PENDING 且没有上次备份时间
    #[instrument(skip(self, params), fields(link = %params.link_name))]
    pub fn add(&self, params: AddBackupLinkParams) -> Result<BackupLinkRecord> {
        if params.link_name.trim().is_empty() || params.bucket.trim().is_empty() {
            return Err(CtcError::config("备份链接名称和 bucket 不能为空"));
        }

        if self.storages.get(&params.storage_id)?.is_none() {
            return Err(CtcError::not_found(format!("存储 {}", params.storage_id)));
        }

        if !Path::new(&params.local_dir_path).is_dir() {
            return Err(CtcError::config(format!(
                "本地路径不存在或不可访问: {}",
                params.local_dir_path
            )));
        }

        parse_frequency(&params.job_frequence_ms)?;

        if self.list_names()?.iter().any(|n| n == &params.link_name) {
            return Err(CtcError::config(format!(
                "备份链接名称已存在: {}",
                params.link_name
            )));
        }

        let record = BackupLinkRecord::from_params(Uuid::new_v4().to_string(), params);
        self.links.insert(&record)?;

        info!(id = %record.id, "备份链接已添加");
        Ok(record)
    }

    /// 删除备份链接；正在运行或已排期的任务由守护进程在收到变更后取消
    pub fn remove(&self, id: &str) -> Result<Option<BackupLinkRecord>> {
        let removed = self.links.remove(id)?;
        if let Some(record) = &removed {
            info!(id = %id, link = %record.link_name, "备份链接已删除");
        }
        Ok(removed)
    }

    /// 删除引用指定存储的全部备份链接
    pub fn remove_by_storage(&self, storage_id: &str) -> Result<Vec<BackupLinkRecord>> {
        let mut removed = Vec::new();
        for link in self.list()? {
            if link.storage_id == storage_id {
                if let Some(record) = self.remove(&link.id)? {
                    removed.push(record);
                }
            }
        }
        Ok(removed)
    }

    /// 距离下一次执行的时间；正在运行的链接返回 None
    pub fn next_run_in(&self, record: &BackupLinkRecord) -> Option<Duration> {
        if record.is_active() {
            return None;
        }
        compute_wait_time(record, Utc::now().timestamp_millis()).ok()
    }

    /// 工作进程入口：执行一次备份
    ///
    /// 开始时写入 ACTIVE 和本进程号；结束时（无论成功与否）写回 PENDING，
    /// 清除进程号并把 `lastBackupTimestamp` 设为本次开始时间。
    #[instrument(skip(self))]
    pub fn start_backup(&self, id: &str, force: bool) -> Result<BackupSummary> {
        let record = self
            .links
            .get(id)?
            .ok_or_else(|| CtcError::not_found(format!("备份链接 {id}")))?;

        if record.is_active() && !force {
            return Err(CtcError::backup(format!(
                "备份链接 '{}' 正在运行，如需强制执行请使用 --force",
                record.link_name
            )));
        }

        let started_at = Utc::now().timestamp_millis();
        let pid = std::process::id();
        self.links.modify(id, |r| {
            r.status = BackupLinkStatus::Active;
            r.process_pid = Some(pid);
        })?;
        info!(link = %record.link_name, pid, "开始备份");

        let outcome = self.transfer(&record);

        let finished = self.links.modify(id, |r| {
            r.status = BackupLinkStatus::Pending;
            r.process_pid = None;
            r.last_backup_timestamp = Some(started_at);
        })?;
        if finished.is_none() {
            warn!(id = %id, "备份过程中备份链接已被删除");
        }

        match &outcome {
            Ok(summary) => info!(
                link = %record.link_name,
                files = summary.files,
                bytes = summary.bytes,
                "备份完成"
            ),
            Err(e) => warn!(link = %record.link_name, error = %e, "备份失败"),
        }

        outcome
    }

    fn transfer(&self, record: &BackupLinkRecord) -> Result<BackupSummary> {
        let storage = self
            .storages
            .get(&record.storage_id)?
            .ok_or_else(|| CtcError::not_found(format!("存储 {}", record.storage_id)))?;

        let uploader = uploader_for(&storage)?;
        let plan = build_upload_plan(
            Path::new(&record.local_dir_path),
            record.prefix.as_deref(),
            record.last_backup_timestamp,
        )?;

        let mut summary = BackupSummary::default();
        for item in &plan {
            uploader.upload(&record.bucket, item)?;
            summary.files += 1;
            summary.bytes += item.size;
        }

        Ok(summary)
    }
}
