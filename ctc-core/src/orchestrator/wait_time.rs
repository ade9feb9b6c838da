use crate::backup_link::{BackupLinkRecord, compute_wait_time};
use crate::error::Result;
use chrono::Utc;
use std::time::Duration;

/// 计算一个 PENDING 链接距离下一次执行还需等待多久
pub trait WaitTimeCalculator: Send {
    fn wait_time(&self, record: &BackupLinkRecord) -> Result<Duration>;
}

/// 根据 `jobFrequenceMs` 与 `lastBackupTimestamp` 计算等待时间
#[derive(Debug, Default, Clone)]
pub struct FrequencyWaitTime;

impl WaitTimeCalculator for FrequencyWaitTime {
    fn wait_time(&self, record: &BackupLinkRecord) -> Result<Duration> {
        compute_wait_time(record, Utc::now().timestamp_millis())
    }
}
