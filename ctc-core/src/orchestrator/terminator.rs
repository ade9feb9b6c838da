use crate::error::{CtcError, Result};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info, warn};

/// 终止一个进程及其全部子进程
pub trait ProcessTerminator: Send {
    fn terminate(&self, pid: u32) -> Result<()>;
}

/// 按进程树终止
///
/// Unix: 先收集子孙进程，再向进程组和树中每个进程发送 SIGKILL；
/// Windows: 调用 `taskkill /T /F`。进程已经不存在视为成功。
#[derive(Debug, Default, Clone)]
pub struct TreeTerminator;

impl TreeTerminator {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessTerminator for TreeTerminator {
    fn terminate(&self, pid: u32) -> Result<()> {
        terminate_tree(pid)?;
        info!(pid, "已终止工作进程树");
        Ok(())
    }
}

#[cfg(unix)]
fn terminate_tree(pid: u32) -> Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill, killpg};
    use nix::unistd::Pid;

    let root = i32::try_from(pid).map_err(|_| CtcError::terminate(format!("无效的进程号: {pid}")))?;

    // 父进程退出后子进程会被重新挂到 init 下，必须先收集
    let tree = match list_processes() {
        Ok(table) => collect_tree(pid, &table),
        Err(e) => {
            warn!(pid, error = %e, "读取进程表失败，仅终止进程组");
            vec![pid]
        }
    };

    match killpg(Pid::from_raw(root), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => debug!(pid, error = %e, "向进程组发送信号失败"),
    }

    let mut failures = Vec::new();
    for p in tree {
        let Ok(raw) = i32::try_from(p) else { continue };
        match kill(Pid::from_raw(raw), Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => failures.push(format!("{p}: {e}")),
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(CtcError::terminate(failures.join(", ")))
    }
}

#[cfg(unix)]
fn list_processes() -> Result<Vec<(u32, u32)>> {
    let output = std::process::Command::new("ps")
        .args(["-A", "-o", "pid=", "-o", "ppid="])
        .output()?;
    if !output.status.success() {
        return Err(CtcError::terminate(format!("ps 执行失败: {}", output.status)));
    }
    Ok(parse_process_table(&String::from_utf8_lossy(&output.stdout)))
}

#[cfg(windows)]
fn terminate_tree(pid: u32) -> Result<()> {
    // taskkill 找不到进程时返回 128
    const NOT_FOUND: i32 = 128;

    let output = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .output()?;

    match output.status.code() {
        Some(0) | Some(NOT_FOUND) => Ok(()),
        _ => Err(CtcError::terminate(format!(
            "taskkill {pid}: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ))),
    }
}

#[cfg(not(any(unix, windows)))]
fn terminate_tree(pid: u32) -> Result<()> {
    Err(CtcError::platform(format!("当前平台不支持终止进程 {pid}")))
}

/// 解析 `ps -o pid= -o ppid=` 输出
#[cfg_attr(not(unix), allow(dead_code))]
fn parse_process_table(output: &str) -> Vec<(u32, u32)> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let pid = parts.next()?.parse().ok()?;
            let ppid = parts.next()?.parse().ok()?;
            Some((pid, ppid))
        })
        .collect()
}

/// 以 `root` 为根的进程树，根在前，按层级展开
#[cfg_attr(not(unix), allow(dead_code))]
fn collect_tree(root: u32, table: &[(u32, u32)]) -> Vec<u32> {
    let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
    for &(pid, ppid) in table {
        if pid != ppid {
            children.entry(ppid).or_default().push(pid);
        }
    }

    let mut tree = vec![root];
    let mut queue = VecDeque::from([root]);
    while let Some(pid) = queue.pop_front() {
        for &child in children.get(&pid).into_iter().flatten() {
            if !tree.contains(&child) {
                tree.push(child);
                queue.push_back(child);
            }
        }
    }
    tree
}
