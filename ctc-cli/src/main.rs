use clap::Parser;
use ctc_cli::{Cli, CliApp, Commands, run_init, setup_daemon_logging, setup_logging};
use ctc_core::{CtcError, constants::app};
use tracing::error;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // 解析命令行参数
    let cli = Cli::parse();

    // 守护进程日志写入日志目录，其余命令输出到终端
    let _log_guard = if cli.command.is_daemon() {
        match setup_daemon_logging(cli.verbose) {
            Ok(guard) => Some(guard),
            Err(e) => {
                eprintln!("❌ 无法初始化守护进程日志: {e}");
                std::process::exit(1);
            }
        }
    } else {
        setup_logging(cli.verbose);
        None
    };

    // `init` 命令是特例，它不需要预先加载配置
    if let Commands::Init { force } = cli.command {
        if let Err(e) = run_init(force) {
            error!("❌ 初始化失败: {}", e);
            std::process::exit(1);
        }
        return;
    }

    // 对于其他所有命令，我们需要加载配置并初始化App
    let mut app = match CliApp::new_with_auto_config() {
        Ok(app) => app,
        Err(CtcError::ConfigNotFound) => {
            error!(
                "❌ 配置文件 '{}' 未找到。",
                app::get_config_file_path().display()
            );
            error!("👉 请先运行 'ctc init' 命令来初始化。");
            std::process::exit(1);
        }
        Err(e) => {
            error!("❌ 应用初始化失败: {}", e);
            std::process::exit(1);
        }
    };

    // 运行命令
    if let Err(e) = app.run_command(cli.command).await {
        error!("❌ 操作失败: {}", e);
        std::process::exit(1);
    }
}
