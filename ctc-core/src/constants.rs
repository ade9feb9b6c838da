/// 应用数据目录相关常量
pub mod app {
    use std::path::PathBuf;

    /// 应用目录名
    pub const APP_DIR_NAME: &str = "cloud-tenant-cli";

    /// 覆盖数据目录的环境变量
    pub const DATA_DIR_ENV: &str = "CTC_DATA_DIR";

    /// 配置文件名
    pub const CONFIG_FILE_NAME: &str = "config.toml";

    /// 备份链接存储文件名
    pub const BACKUP_LINKS_FILE_NAME: &str = "backup-links.json";

    /// 存储配置文件名
    pub const STORAGES_FILE_NAME: &str = "storages.json";

    /// 日志目录名
    pub const LOG_DIR_NAME: &str = "logs";

    /// 守护进程日志文件前缀
    pub const DAEMON_LOG_PREFIX: &str = "ctc-daemon.log";

    /// 获取应用数据目录（跨平台）
    /// 优先使用 `CTC_DATA_DIR`，否则使用系统数据目录
    pub fn get_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                return PathBuf::from(dir);
            }
        }

        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME)
    }

    /// 获取配置文件路径
    pub fn get_config_file_path() -> PathBuf {
        get_data_dir().join(CONFIG_FILE_NAME)
    }
}

/// 备份工作进程命令相关常量
pub mod worker {
    /// 默认可执行文件名
    pub const DEFAULT_EXECUTABLE: &str = "ctc";

    /// 工作进程子命令（可执行文件之后的固定部分）
    pub const START_ONE_SUBCOMMAND: &str = "backup-links start-one --force";

    /// 传递备份链接ID的参数名
    pub const ID_FLAG: &str = "--id";
}

/// 守护进程相关常量
pub mod daemon {
    /// 存储轮询间隔（毫秒）
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

    /// 定时启动失败后的重试间隔（秒）
    pub const DEFAULT_LAUNCH_RETRY_SECS: u64 = 60;

    /// 存储变更通知通道容量
    pub const CHANGE_CHANNEL_CAPACITY: usize = 16;
}

/// 开机启动相关常量
pub mod startup {
    /// Windows 注册表启动项路径
    pub const WINDOWS_RUN_KEY: &str = r"HKCU\Software\Microsoft\Windows\CurrentVersion\Run";

    /// 启动项名称
    pub const ENTRY_NAME: &str = "CloudTenantCLI";

    /// systemd 用户单元名
    pub const SYSTEMD_UNIT_NAME: &str = "cloud-tenant-cli.service";

    /// 守护进程子命令
    pub const DAEMON_SUBCOMMAND: &str = "startup do-logic";
}
