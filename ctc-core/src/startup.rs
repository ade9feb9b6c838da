use crate::constants::startup;
use crate::error::{CtcError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// 支持开机启动的平台
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupPlatform {
    Windows,
    Linux,
}

impl StartupPlatform {
    pub fn current() -> Result<Self> {
        Self::from_os(std::env::consts::OS)
    }

    pub fn from_os(os: &str) -> Result<Self> {
        match os {
            "windows" => Ok(StartupPlatform::Windows),
            "linux" => Ok(StartupPlatform::Linux),
            other => Err(CtcError::platform(format!("不支持为 {other} 生成开机启动脚本"))),
        }
    }
}

/// 生成注册/取消开机启动的命令
///
/// 命令只打印给用户执行，不会在这里运行。Linux 下会先把 systemd 用户单元写入数据目录。
#[derive(Debug, Clone)]
pub struct StartupService {
    platform: StartupPlatform,
    executable: PathBuf,
    data_dir: PathBuf,
}

impl StartupService {
    pub fn new(platform: StartupPlatform, executable: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            platform,
            executable,
            data_dir,
        }
    }

    /// 使用当前平台和当前可执行文件
    pub fn for_current(data_dir: PathBuf) -> Result<Self> {
        let executable = std::env::current_exe()?;
        Ok(Self::new(StartupPlatform::current()?, executable, data_dir))
    }

    fn daemon_command(&self) -> String {
        format!(
            "\"{}\" {}",
            self.executable.display(),
            startup::DAEMON_SUBCOMMAND
        )
    }

    pub fn unit_file_path(&self) -> PathBuf {
        self.data_dir.join(startup::SYSTEMD_UNIT_NAME)
    }

    pub fn generate_startup_script(&self) -> Result<String> {
        match self.platform {
            StartupPlatform::Windows => Ok(format!(
                "reg add \"{}\" /v {} /t REG_SZ /d \"{}\" /f",
                startup::WINDOWS_RUN_KEY,
                startup::ENTRY_NAME,
                self.daemon_command().replace('"', "\\\"")
            )),
            StartupPlatform::Linux => {
                let unit_path = self.unit_file_path();
                write_unit_file(&unit_path, &self.systemd_unit())?;
                Ok(format!(
                    "systemctl --user link \"{}\" && systemctl --user enable --now {}",
                    unit_path.display(),
                    startup::SYSTEMD_UNIT_NAME
                ))
            }
        }
    }

    pub fn generate_unstartup_script(&self) -> Result<String> {
        match self.platform {
            StartupPlatform::Windows => Ok(format!(
                "reg delete \"{}\" /v {} /f",
                startup::WINDOWS_RUN_KEY,
                startup::ENTRY_NAME
            )),
            StartupPlatform::Linux => Ok(format!(
                "systemctl --user disable --now {}",
                startup::SYSTEMD_UNIT_NAME
            )),
        }
    }

    fn systemd_unit(&self) -> String {
        format!(
            "[Unit]\n\
             Description=Cloud Tenant CLI backup scheduler\n\
             After=default.target\n\
             \n\
             [Service]\n\
             Type=simple\n\
             ExecStart={}\n\
             Restart=on-failure\n\
             \n\
             [Install]\n\
             WantedBy=default.target\n",
            self.daemon_command()
        )
    }
}

fn write_unit_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    info!(path = %path.display(), "systemd 用户单元已写入");
    Ok(())
}
