use crate::app::CliApp;
use anyhow::Context;
use ctc_core::error::Result;
use ctc_core::orchestrator::{
    DetachedLauncher, FrequencyWaitTime, Orchestrator, OrchestratorOptions, TreeTerminator,
};
use ctc_core::startup::StartupService;
use ctc_core::store::{RecordStore, StoreWatcher};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, instrument, warn};

/// 打印注册开机启动的命令
pub fn show_startup_script(app: &CliApp) -> Result<()> {
    let script = StartupService::for_current(app.data_dir.clone())?.generate_startup_script()?;
    info!("👉 执行以下命令，在登录时自动启动备份调度:");
    println!("{script}");
    Ok(())
}

/// 打印取消开机启动的命令
pub fn show_unstartup_script(app: &CliApp) -> Result<()> {
    let script = StartupService::for_current(app.data_dir.clone())?.generate_unstartup_script()?;
    info!("👉 执行以下命令，取消开机启动:");
    println!("{script}");
    Ok(())
}

/// 备份调度守护进程
///
/// 读取一次完整快照并执行首次收敛，然后轮询存储变更，直到收到退出信号。
#[instrument(skip(app))]
pub async fn run_daemon(app: &CliApp) -> anyhow::Result<()> {
    let store = app.backup_links.store().clone();
    let initial = store
        .read_snapshot()
        .with_context(|| format!("读取备份链接失败: {}", store.path().display()))?;

    let options = OrchestratorOptions {
        executable: app.config.daemon.executable.clone(),
        launch_retry: app.config.launch_retry(),
    };
    let mut orchestrator = Orchestrator::new(
        Box::new(DetachedLauncher::new()),
        Box::new(TreeTerminator::new()),
        Box::new(FrequencyWaitTime),
        options,
    );
    orchestrator.startup(initial.clone());

    let watcher = StoreWatcher::spawn(Arc::new(store), initial, app.config.poll_interval());
    orchestrator
        .run(watcher.into_receiver(), shutdown_signal())
        .await;

    info!("👋 备份调度守护进程已退出");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "无法监听 Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "无法监听 SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
