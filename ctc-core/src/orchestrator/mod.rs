//! 备份链接调度
//!
//! 启动时对完整快照执行一次收敛，之后每次存储变更先比较快照差异，
//! 再只对受影响的ID执行收敛或取消。

mod differ;
mod engine;
mod launcher;
mod terminator;
mod timer;
mod wait_time;

pub use differ::{SnapshotDiff, diff_snapshots};
pub use engine::{Orchestrator, OrchestratorOptions, OrchestratorStats, PassReport};
pub use launcher::{DetachedLauncher, ProcessLauncher, WorkerCommand};
pub use terminator::{ProcessTerminator, TreeTerminator};
pub use timer::{TimerFired, TimerHandle};
pub use wait_time::{FrequencyWaitTime, WaitTimeCalculator};
