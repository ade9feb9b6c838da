use crate::constants::worker;
use crate::error::{CtcError, Result};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// 备份工作进程命令
///
/// `command` 是包含固定子命令的命令字符串，`args` 是附加参数向量，
/// 例如 `"ctc backup-links start-one --force"` + `["--id", "<id>"]`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub command: String,
    pub args: Vec<String>,
}

impl WorkerCommand {
    /// 为指定备份链接构造 start-one 命令
    pub fn start_one(executable: &str, id: &str) -> Self {
        Self {
            command: format!("{executable} {}", worker::START_ONE_SUBCOMMAND),
            args: vec![worker::ID_FLAG.to_string(), id.to_string()],
        }
    }

    /// 完整参数向量：程序名在前
    pub fn argv(&self) -> Vec<String> {
        self.command
            .split_whitespace()
            .map(str::to_string)
            .chain(self.args.iter().cloned())
            .collect()
    }
}

/// 启动工作进程，返回进程号
pub trait ProcessLauncher: Send {
    fn launch(&self, command: &WorkerCommand) -> Result<u32>;
}

/// 以独立进程方式启动工作进程，不等待其结束
///
/// Unix 上工作进程成为新进程组的组长，终止时可以连同子进程一起处理；
/// 标准输入输出全部重定向到空设备。进程退出后由 tokio 运行时回收。
#[derive(Debug, Default, Clone)]
pub struct DetachedLauncher;

impl DetachedLauncher {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessLauncher for DetachedLauncher {
    fn launch(&self, command: &WorkerCommand) -> Result<u32> {
        let argv = command.argv();
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| CtcError::launch("工作进程命令为空"))?;

        let program = resolve_program(program);
        debug!(program = %program.display(), ?args, "启动工作进程");

        let mut cmd = Command::new(&program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false);
        detach(&mut cmd)?;

        let child = cmd
            .spawn()
            .map_err(|e| CtcError::launch(format!("{}: {e}", program.display())))?;
        let pid = child
            .id()
            .ok_or_else(|| CtcError::launch("无法获取工作进程号"))?;

        info!(pid, command = %command.command, args = ?command.args, "工作进程已启动");
        Ok(pid)
    }
}

/// 在 PATH 中查找程序，找不到时使用当前可执行文件
fn resolve_program(program: &str) -> PathBuf {
    match which::which(program) {
        Ok(path) => path,
        Err(_) => match std::env::current_exe() {
            Ok(exe) => {
                debug!(program, exe = %exe.display(), "PATH 中未找到程序，使用当前可执行文件");
                exe
            }
            Err(_) => PathBuf::from(program),
        },
    }
}

#[cfg(unix)]
fn detach(cmd: &mut Command) -> Result<()> {
    cmd.process_group(0);
    Ok(())
}

#[cfg(windows)]
fn detach(cmd: &mut Command) -> Result<()> {
    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
    Ok(())
}

#[cfg(not(any(unix, windows)))]
fn detach(_cmd: &mut Command) -> Result<()> {
    Err(CtcError::platform("当前平台不支持启动独立的工作进程"))
}
