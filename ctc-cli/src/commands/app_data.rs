use crate::app::CliApp;
use ctc_core::error::Result;
use ctc_core::orchestrator::{ProcessTerminator, TreeTerminator};
use tracing::{info, instrument, warn};

/// 终止正在运行的备份进程并删除数据目录
#[instrument(skip(app))]
pub fn remove_data(app: &CliApp, yes: bool) -> Result<()> {
    if !yes {
        warn!("⚠️  此操作将删除全部配置、存储和备份链接: {}", app.data_dir.display());
        info!("确认删除请使用 --yes 参数");
        info!("示例: ctc remove-data --yes");
        return Ok(());
    }

    stop_running_backups(app, &TreeTerminator::new())?;

    if app.data_dir.exists() {
        std::fs::remove_dir_all(&app.data_dir)?;
    }
    info!("✅ 应用数据已删除: {}", app.data_dir.display());
    Ok(())
}

/// 终止所有记录为 ACTIVE 的备份进程，返回尝试终止的进程数
fn stop_running_backups(app: &CliApp, terminator: &dyn ProcessTerminator) -> Result<usize> {
    let mut stopped = 0;
    for link in app.backup_links.list()? {
        let Some(pid) = link.process_pid.filter(|_| link.is_active()) else {
            continue;
        };

        stopped += 1;
        match terminator.terminate(pid) {
            Ok(()) => info!("🛑 已停止备份: {} (PID {})", link.link_name, pid),
            Err(e) => warn!("停止备份 {} 失败: {}", link.link_name, e),
        }
    }
    Ok(stopped)
}
