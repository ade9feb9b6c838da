use ctc_core::config::AppConfig;
use ctc_core::constants::app;
use ctc_core::error::Result;
use std::path::PathBuf;
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;

/// # CloudTenant CLI 日志系统
///
/// - 库代码只使用 `tracing` 宏：`info!()`, `warn!()`, `error!()`, `debug!()`
/// - 应用入口控制日志配置：在 `main.rs` 中调用 `setup_logging()` 或 `setup_daemon_logging()`
///
/// ## 环境变量
/// - `RUST_LOG`：标准的 Rust 日志级别控制
/// - `CTC_LOG_FILE`：日志文件路径，设置后日志输出到文件而非终端
///
/// ```bash
/// # 详细日志输出到终端
/// ctc -v backup-links --status
///
/// # 日志输出到文件
/// CTC_LOG_FILE=ctc.log ctc storages --status
/// ```
///
/// 终端输出使用简洁格式，文件输出包含模块路径和行号。
pub fn setup_logging(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let log_file = std::env::var("CTC_LOG_FILE").ok().map(|path| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| (path, e))
    });

    match log_file {
        Some(Ok(file)) => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(file)
                .with_ansi(false)
                .with_target(true)
                .with_thread_names(true)
                .with_line_number(true)
                .init();
        }
        other => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_thread_names(false)
                .with_line_number(false)
                .without_time()
                .compact()
                .init();

            if let Some(Err((path, e))) = other {
                warn!(path = %path, error = %e, "无法打开日志文件，改为输出到终端");
            }
        }
    }
}

/// 守护进程日志：按天滚动写入日志目录
///
/// 返回的 guard 必须在守护进程退出前一直持有，否则缓冲中的日志会丢失。
pub fn setup_daemon_logging(verbose: bool) -> Result<WorkerGuard> {
    use tracing_subscriber::{EnvFilter, fmt};

    let log_dir = daemon_log_dir();
    std::fs::create_dir_all(&log_dir)?;

    let appender = tracing_appender::rolling::daily(&log_dir, app::DAEMON_LOG_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .init();

    Ok(guard)
}

fn daemon_log_dir() -> PathBuf {
    AppConfig::load()
        .map(|config| config.get_log_dir())
        .unwrap_or_else(|_| app::get_data_dir().join(app::LOG_DIR_NAME))
}
