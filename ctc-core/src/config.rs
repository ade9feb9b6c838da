use crate::constants::{app, daemon, worker};
use crate::error::{CtcError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 应用配置结构
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    pub daemon: DaemonConfig,
    pub logging: LoggingConfig,
}

/// 守护进程相关配置
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DaemonConfig {
    /// 工作进程命令中使用的可执行文件
    pub executable: String,
    /// 存储轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 定时启动失败后的重试间隔（秒）
    pub launch_retry_secs: u64,
}

/// 日志相关配置
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LoggingConfig {
    pub directory: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            daemon: DaemonConfig {
                executable: worker::DEFAULT_EXECUTABLE.to_string(),
                poll_interval_ms: daemon::DEFAULT_POLL_INTERVAL_MS,
                launch_retry_secs: daemon::DEFAULT_LAUNCH_RETRY_SECS,
            },
            logging: LoggingConfig {
                directory: app::get_data_dir()
                    .join(app::LOG_DIR_NAME)
                    .to_string_lossy()
                    .to_string(),
            },
        }
    }
}

impl AppConfig {
    /// 从默认数据目录加载配置
    pub fn load() -> Result<Self> {
        let path = app::get_config_file_path();
        if !path.exists() {
            return Err(CtcError::ConfigNotFound);
        }
        Self::load_from_file(path)
    }

    /// 从指定文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.daemon.executable.trim().is_empty() {
            return Err(CtcError::config("daemon.executable 不能为空"));
        }
        if self.daemon.poll_interval_ms == 0 {
            return Err(CtcError::config("daemon.poll_interval_ms 必须大于 0"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.daemon.poll_interval_ms)
    }

    pub fn launch_retry(&self) -> Duration {
        Duration::from_secs(self.daemon.launch_retry_secs)
    }

    /// 获取日志目录路径
    pub fn get_log_dir(&self) -> PathBuf {
        PathBuf::from(&self.logging.directory)
    }
}
