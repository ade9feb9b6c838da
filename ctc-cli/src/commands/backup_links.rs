use crate::app::CliApp;
use chrono::{DateTime, Local, Utc};
use ctc_core::backup_link::{AddBackupLinkParams, BackupLinkRecord};
use ctc_core::error::Result;
use std::time::Duration;
use tracing::{info, instrument};

/// 命令行传入的新备份链接参数，存储以名称表示
#[derive(Debug, Clone)]
pub struct NewBackupLink {
    pub storage: String,
    pub bucket: String,
    pub path: String,
    pub frequency: String,
    pub name: String,
    pub prefix: Option<String>,
}

/// 列出全部备份链接，`status` 为真时显示运行状态和下一次执行时间
#[instrument(skip(app))]
pub fn list_backup_links(app: &CliApp, status: bool) -> Result<()> {
    let links = app.backup_links.list()?;
    if links.is_empty() {
        info!("暂无备份链接，使用 'ctc backup-links add' 添加");
        return Ok(());
    }

    info!("🔗 备份链接 ({} 个):", links.len());
    for link in &links {
        if status {
            info!("   - {}", describe_status(app, link));
        } else {
            info!("   - {}", link.link_name);
        }
    }
    Ok(())
}

fn describe_status(app: &CliApp, link: &BackupLinkRecord) -> String {
    let last = link
        .last_backup_timestamp
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|t| {
            t.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| "从未执行".to_string());

    let next = match app.backup_links.next_run_in(link) {
        Some(wait) if wait.is_zero() => "立即".to_string(),
        Some(wait) => format_wait(wait),
        None if link.is_active() => "运行中".to_string(),
        None => "频率无效".to_string(),
    };

    format!(
        "{} [{}] 上次备份: {} | 下一次: {}",
        link.link_name, link.status, last, next
    )
}

fn format_wait(wait: Duration) -> String {
    let secs = wait.as_secs();
    let (hours, minutes) = (secs / 3600, (secs % 3600) / 60);
    match (hours, minutes) {
        (0, 0) => format!("{} 秒后", secs),
        (0, m) => format!("{} 分钟后", m),
        (h, m) => format!("{} 小时 {} 分钟后", h, m),
    }
}

pub fn add_backup_link(app: &CliApp, link: NewBackupLink) -> Result<()> {
    let storage_id = app.storages.name_to_id(&link.storage)?;

    let record = app.backup_links.add(AddBackupLinkParams {
        storage_id,
        bucket: link.bucket,
        local_dir_path: link.path,
        job_frequence_ms: link.frequency,
        link_name: link.name,
        prefix: link.prefix,
    })?;

    info!("✅ 备份链接已添加: {} (ID: {})", record.link_name, record.id);
    info!("💡 调度守护进程会自动为其排期");
    Ok(())
}

pub fn remove_backup_link(app: &CliApp, name: &str) -> Result<()> {
    let id = app.backup_links.name_to_id(name)?;
    app.backup_links.remove(&id)?;
    info!("✅ 备份链接已删除: {}", name);
    Ok(())
}

/// 工作进程入口：执行一次备份
#[instrument(skip(app))]
pub fn start_one(app: &CliApp, id: &str, force: bool) -> Result<()> {
    let summary = app.backup_links.start_backup(id, force)?;
    info!(
        "✅ 备份完成: {} 个文件, {:.1} MB",
        summary.files,
        summary.bytes as f64 / 1024.0 / 1024.0
    );
    Ok(())
}
