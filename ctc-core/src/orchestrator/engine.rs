use super::differ::{SnapshotDiff, diff_snapshots};
use super::launcher::{ProcessLauncher, WorkerCommand};
use super::terminator::ProcessTerminator;
use super::timer::{TimerFired, TimerHandle};
use super::wait_time::WaitTimeCalculator;
use crate::backup_link::{BackupLinkRecord, BackupLinkStatus, Snapshot};
use crate::constants::{daemon, worker};
use crate::error::{CtcError, Result};
use crate::store::StoreSnapshot;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// 调度器参数
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// 工作进程可执行文件名
    pub executable: String,
    /// 定时器到期但启动失败时，重新排期的等待时间
    pub launch_retry: Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            executable: worker::DEFAULT_EXECUTABLE.to_string(),
            launch_retry: Duration::from_secs(daemon::DEFAULT_LAUNCH_RETRY_SECS),
        }
    }
}

/// 运行计数
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorStats {
    pub launches: u64,
    pub launch_failures: u64,
    pub timers_armed: u64,
    pub timers_cancelled: u64,
    pub terminations: u64,
}

/// 一次收敛或一次事件处理的结果
#[derive(Debug, Default)]
pub struct PassReport {
    pub launched: Vec<String>,
    pub scheduled: Vec<String>,
    pub cancelled: Vec<String>,
    /// 处理失败的ID，其余ID不受影响
    pub failures: Vec<(String, CtcError)>,
}

impl PassReport {
    pub fn is_empty(&self) -> bool {
        self.launched.is_empty()
            && self.scheduled.is_empty()
            && self.cancelled.is_empty()
            && self.failures.is_empty()
    }

    fn log(&self, source: &str) {
        if !self.launched.is_empty() || !self.scheduled.is_empty() || !self.cancelled.is_empty() {
            info!(
                source,
                launched = self.launched.len(),
                scheduled = self.scheduled.len(),
                cancelled = self.cancelled.len(),
                "调度状态已更新"
            );
        }
        for (id, e) in &self.failures {
            warn!(source, id = %id, error = %e, "⚠️ 处理备份链接失败");
        }
    }
}

/// 备份链接调度器
///
/// 持有两张内存表：`scheduled`（ID → 定时器）和 `ongoing`（ID → 工作进程号），
/// 并保留上一次处理过的快照用于比较。所有修改都在同一个事件循环里完成，
/// 每个事件处理完毕后才处理下一个。
pub struct Orchestrator {
    launcher: Box<dyn ProcessLauncher>,
    terminator: Box<dyn ProcessTerminator>,
    wait_time: Box<dyn WaitTimeCalculator>,
    options: OrchestratorOptions,
    scheduled: HashMap<String, TimerHandle>,
    ongoing: HashMap<String, u32>,
    /// 本轮处理失败、下一次变更通知时重试的ID
    retry: BTreeSet<String>,
    previous: Snapshot,
    timer_tx: mpsc::UnboundedSender<TimerFired>,
    timer_rx: mpsc::UnboundedReceiver<TimerFired>,
    next_generation: u64,
    stats: OrchestratorStats,
}

impl Orchestrator {
    pub fn new(
        launcher: Box<dyn ProcessLauncher>,
        terminator: Box<dyn ProcessTerminator>,
        wait_time: Box<dyn WaitTimeCalculator>,
        options: OrchestratorOptions,
    ) -> Self {
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        Self {
            launcher,
            terminator,
            wait_time,
            options,
            scheduled: HashMap::new(),
            ongoing: HashMap::new(),
            retry: BTreeSet::new(),
            previous: Snapshot::new(),
            timer_tx,
            timer_rx,
            next_generation: 0,
            stats: OrchestratorStats::default(),
        }
    }

    pub fn stats(&self) -> OrchestratorStats {
        self.stats
    }

    pub fn is_scheduled(&self, id: &str) -> bool {
        self.scheduled.contains_key(id)
    }

    pub fn is_ongoing(&self, id: &str) -> bool {
        self.ongoing.contains_key(id)
    }

    pub fn ongoing_pid(&self, id: &str) -> Option<u32> {
        self.ongoing.get(id).copied()
    }

    pub fn scheduled_count(&self) -> usize {
        self.scheduled.len()
    }

    pub fn ongoing_count(&self) -> usize {
        self.ongoing.len()
    }

    /// 启动时对完整快照执行一次收敛，并记住该快照
    pub fn startup(&mut self, snapshot: impl Into<StoreSnapshot>) -> PassReport {
        let StoreSnapshot { records, invalid } = snapshot.into();
        info!(records = records.len(), invalid = invalid.len(), "🚀 备份调度启动");

        let mut report = self.converge(&records);
        for id in invalid {
            report.failures.push((id, CtcError::config("备份链接记录无法解析")));
        }
        self.previous = records;
        report.log("startup");
        report
    }

    /// 对快照中的每个ID执行收敛；重复调用不会重复启动或重复排期
    pub fn converge(&mut self, snapshot: &Snapshot) -> PassReport {
        let mut report = PassReport::default();
        for record in snapshot.values() {
            self.converge_record(record, &mut report);
        }
        report
    }

    fn converge_ids<'a, I>(&mut self, snapshot: &Snapshot, ids: I, report: &mut PassReport)
    where
        I: IntoIterator<Item = &'a String>,
    {
        for id in ids {
            if let Some(record) = snapshot.get(id) {
                self.converge_record(record, report);
            }
        }
    }

    fn converge_record(&mut self, record: &BackupLinkRecord, report: &mut PassReport) {
        let id = record.id.as_str();

        // 已有进程在运行，无论存储中的状态如何都不再处理
        if self.ongoing.contains_key(id) {
            return;
        }

        match record.status {
            BackupLinkStatus::Active => {
                warn!(id, pid = ?record.process_pid, "发现没有对应进程的 ACTIVE 记录，立即重新执行");
                self.cancel_timer(id);
                match self.launch(id) {
                    Ok(_) => report.launched.push(id.to_string()),
                    Err(e) => {
                        self.retry.insert(id.to_string());
                        report.failures.push((id.to_string(), e));
                    }
                }
            }
            BackupLinkStatus::Pending => {
                if !self.scheduled.contains_key(id) {
                    self.schedule(record, report);
                }
            }
        }
    }

    fn schedule(&mut self, record: &BackupLinkRecord, report: &mut PassReport) {
        match self.wait_time.wait_time(record) {
            Ok(wait) => {
                self.arm_timer(&record.id, wait);
                self.retry.remove(&record.id);
                report.scheduled.push(record.id.clone());
            }
            Err(e) => {
                self.retry.insert(record.id.clone());
                report.failures.push((record.id.clone(), e));
            }
        }
    }

    fn launch(&mut self, id: &str) -> Result<u32> {
        let command = WorkerCommand::start_one(&self.options.executable, id);
        match self.launcher.launch(&command) {
            Ok(pid) => {
                self.ongoing.insert(id.to_string(), pid);
                self.retry.remove(id);
                self.stats.launches += 1;
                info!(id, pid, "▶️ 备份已启动");
                Ok(pid)
            }
            Err(e) => {
                self.stats.launch_failures += 1;
                error!(id, error = %e, "❌ 启动备份进程失败");
                Err(e)
            }
        }
    }

    fn arm_timer(&mut self, id: &str, wait: Duration) {
        self.next_generation += 1;
        let handle = TimerHandle::arm(
            id.to_string(),
            self.next_generation,
            wait,
            self.timer_tx.clone(),
        );
        if let Some(old) = self.scheduled.insert(id.to_string(), handle) {
            old.cancel();
        }
        self.stats.timers_armed += 1;
        debug!(id, wait_secs = wait.as_secs(), "⏰ 已排期");
    }

    fn cancel_timer(&mut self, id: &str) -> bool {
        match self.scheduled.remove(id) {
            Some(handle) => {
                handle.cancel();
                self.stats.timers_cancelled += 1;
                true
            }
            None => false,
        }
    }

    fn terminate(&mut self, id: &str, pid: u32) {
        self.stats.terminations += 1;
        match self.terminator.terminate(pid) {
            Ok(()) => info!(id, pid, "🛑 已终止备份进程"),
            // 进程已经不存在时目标同样达成
            Err(e) => warn!(id, pid, error = %e, "终止备份进程失败"),
        }
    }

    /// 已删除ID的取消流程
    fn cancel(&mut self, id: &str, last: Option<&BackupLinkRecord>) {
        self.retry.remove(id);

        if let Some(pid) = self.ongoing.remove(id) {
            self.terminate(id, pid);
        } else if self.cancel_timer(id) {
            info!(id, "已取消排期");
        } else if let Some(pid) = last.filter(|r| r.is_active()).and_then(|r| r.process_pid) {
            self.terminate(id, pid);
        }
    }

    /// 处理一次存储变更
    ///
    /// 无法解析的记录沿用上一次的内容：既不取消，也不重新收敛，
    /// 等记录恢复后按正常的变化处理。
    pub fn handle_store_change(&mut self, next: impl Into<StoreSnapshot>) -> PassReport {
        let StoreSnapshot {
            records: mut next,
            invalid,
        } = next.into();
        let previous = std::mem::take(&mut self.previous);
        let mut report = PassReport::default();

        for id in &invalid {
            if let Some(last) = previous.get(id) {
                next.insert(id.clone(), last.clone());
            }
            report
                .failures
                .push((id.clone(), CtcError::config("备份链接记录无法解析")));
        }

        let mut diff = diff_snapshots(&previous, &next);
        self.collect_finished_runs(&previous, &next, &mut diff);

        if !diff.is_empty() {
            debug!(?diff, "备份链接变更");
        }

        for id in &diff.removed {
            self.cancel(id, previous.get(id));
            report.cancelled.push(id.clone());
        }

        for id in &diff.completed {
            self.ongoing.remove(id);
            self.cancel_timer(id);
            if let Some(record) = next.get(id) {
                info!(id = %id, link = %record.link_name, "✅ 备份执行结束，安排下一次");
                self.schedule(record, &mut report);
            }
        }

        for id in &diff.started {
            if self.ongoing.contains_key(id) {
                continue;
            }
            if let Some(pid) = next.get(id).and_then(|r| r.process_pid) {
                self.cancel_timer(id);
                self.ongoing.insert(id.clone(), pid);
                info!(id = %id, pid, "接管已在运行的备份进程");
            }
        }

        for id in &diff.rescheduled {
            if self.cancel_timer(id) {
                debug!(id = %id, "执行频率或上次备份时间已修改，重新排期");
            }
        }

        self.retry.retain(|id| next.contains_key(id));
        let retry: Vec<String> = self
            .retry
            .iter()
            .filter(|id| !invalid.contains(*id))
            .cloned()
            .collect();

        self.converge_ids(
            &next,
            diff.added.iter().chain(&diff.rescheduled).chain(&retry),
            &mut report,
        );

        self.previous = next;
        report.log("store");
        report
    }

    /// 找出仍在 `ongoing` 中、但时间戳已前进的ID
    ///
    /// 执行很快结束时，两次轮询之间 ACTIVE 和 PENDING 都已写入，
    /// 比较结果只有 PENDING 的时间戳变化，这里同样视为执行结束。
    fn collect_finished_runs(
        &self,
        previous: &Snapshot,
        next: &Snapshot,
        diff: &mut SnapshotDiff,
    ) {
        for (id, record) in next {
            if !self.ongoing.contains_key(id) || diff.completed.contains(id) {
                continue;
            }
            let Some(old) = previous.get(id) else {
                continue;
            };
            if record.finished_since(old) {
                diff.rescheduled.retain(|r| r != id);
                diff.completed.push(id.clone());
            }
        }
    }

    /// 处理一次定时器到期
    pub fn handle_timer(&mut self, fired: TimerFired) -> PassReport {
        let mut report = PassReport::default();

        let current = self
            .scheduled
            .get(&fired.id)
            .is_some_and(|h| h.generation() == fired.generation);
        if !current {
            debug!(id = %fired.id, "忽略过期的定时器事件");
            return report;
        }
        self.scheduled.remove(&fired.id);

        if self.ongoing.contains_key(&fired.id) {
            return report;
        }

        match self.launch(&fired.id) {
            Ok(_) => report.launched.push(fired.id),
            Err(e) => {
                let retry = self.options.launch_retry;
                warn!(id = %fired.id, retry_secs = retry.as_secs(), "稍后重试启动");
                self.arm_timer(&fired.id, retry);
                report.failures.push((fired.id, e));
            }
        }

        report.log("timer");
        report
    }

    /// 等待下一个到期的定时器
    pub async fn next_timer(&mut self) -> Option<TimerFired> {
        self.timer_rx.recv().await
    }

    /// 事件循环：依次处理定时器到期和存储变更，直到 `shutdown` 完成或变更通道关闭
    pub async fn run<F>(mut self, mut changes: mpsc::Receiver<StoreSnapshot>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("收到退出信号，停止调度");
                    break;
                }
                Some(fired) = self.timer_rx.recv() => {
                    self.handle_timer(fired);
                }
                change = changes.recv() => match change {
                    Some(snapshot) => {
                        self.handle_store_change(snapshot);
                    }
                    None => {
                        warn!("存储变更通道已关闭，停止调度");
                        break;
                    }
                },
            }
        }

        self.shutdown();
    }

    /// 取消全部定时器；已启动的工作进程继续独立运行
    pub fn shutdown(&mut self) {
        let timers = self.scheduled.len();
        for (_, handle) in self.scheduled.drain() {
            handle.cancel();
        }
        info!(
            timers,
            running = self.ongoing.len(),
            "调度器已停止"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup_link::model::fixtures::{record, snapshot};
    use crate::backup_link::BackupLinkStore;
    use crate::orchestrator::FrequencyWaitTime;
    use crate::store::{RecordStore, StoreWatcher};
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;
    use tokio::time::Instant;

    #[derive(Clone)]
    struct MockLauncher {
        calls: Arc<Mutex<Vec<WorkerCommand>>>,
        next_pid: Arc<Mutex<u32>>,
        fail: Arc<Mutex<bool>>,
    }

    impl MockLauncher {
        fn starting_at(pid: u32) -> Self {
            Self {
                calls: Arc::default(),
                next_pid: Arc::new(Mutex::new(pid)),
                fail: Arc::default(),
            }
        }

        fn calls(&self) -> Vec<WorkerCommand> {
            self.calls.lock().unwrap().clone()
        }

        fn set_fail(&self, fail: bool) {
            *self.fail.lock().unwrap() = fail;
        }
    }

    impl ProcessLauncher for MockLauncher {
        fn launch(&self, command: &WorkerCommand) -> Result<u32> {
            if *self.fail.lock().unwrap() {
                return Err(CtcError::launch("spawn failed"));
            }
            self.calls.lock().unwrap().push(command.clone());
            let mut next = self.next_pid.lock().unwrap();
            let pid = *next;
            *next += 1;
            Ok(pid)
        }
    }

    #[derive(Clone, Default)]
    struct MockTerminator {
        killed: Arc<Mutex<Vec<u32>>>,
    }

    impl MockTerminator {
        fn killed(&self) -> Vec<u32> {
            self.killed.lock().unwrap().clone()
        }
    }

    impl ProcessTerminator for MockTerminator {
        fn terminate(&self, pid: u32) -> Result<()> {
            self.killed.lock().unwrap().push(pid);
            Ok(())
        }
    }

    struct FixedWait(Duration);

    impl WaitTimeCalculator for FixedWait {
        fn wait_time(&self, _record: &BackupLinkRecord) -> Result<Duration> {
            Ok(self.0)
        }
    }

    struct Harness {
        orchestrator: Orchestrator,
        launcher: MockLauncher,
        terminator: MockTerminator,
    }

    fn harness_with(wait_time: Box<dyn WaitTimeCalculator>, first_pid: u32) -> Harness {
        let launcher = MockLauncher::starting_at(first_pid);
        let terminator = MockTerminator::default();
        let orchestrator = Orchestrator::new(
            Box::new(launcher.clone()),
            Box::new(terminator.clone()),
            wait_time,
            OrchestratorOptions {
                executable: "ctc".to_string(),
                launch_retry: Duration::from_secs(60),
            },
        );
        Harness {
            orchestrator,
            launcher,
            terminator,
        }
    }

    fn harness(wait: Duration) -> Harness {
        harness_with(Box::new(FixedWait(wait)), 1000)
    }

    fn active_with_pid(id: &str, pid: u32) -> BackupLinkRecord {
        let mut r = record(id, BackupLinkStatus::Active);
        r.process_pid = Some(pid);
        r
    }

    fn completed(id: &str, timestamp: i64) -> BackupLinkRecord {
        let mut r = record(id, BackupLinkStatus::Pending);
        r.last_backup_timestamp = Some(timestamp);
        r
    }

    #[tokio::test]
    async fn test_converge_is_idempotent_for_active() {
        let mut h = harness(Duration::from_secs(3600));
        let snap = snapshot(vec![record("a", BackupLinkStatus::Active)]);

        h.orchestrator.startup(snap.clone());
        for _ in 0..3 {
            let report = h.orchestrator.converge(&snap);
            assert!(report.is_empty());
        }

        assert_eq!(h.launcher.calls().len(), 1);
        assert_eq!(h.orchestrator.ongoing_pid("a"), Some(1000));
        assert_eq!(h.orchestrator.scheduled_count(), 0);
    }

    #[tokio::test]
    async fn test_converge_is_idempotent_for_pending() {
        let mut h = harness(Duration::from_secs(3600));
        let snap = snapshot(vec![record("p", BackupLinkStatus::Pending)]);

        h.orchestrator.startup(snap.clone());
        for _ in 0..3 {
            h.orchestrator.converge(&snap);
        }

        assert_eq!(h.orchestrator.stats().timers_armed, 1);
        assert!(h.orchestrator.is_scheduled("p"));
        assert!(h.launcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_zombie_record_is_launched_once() {
        let mut h = harness(Duration::from_secs(3600));
        let report = h
            .orchestrator
            .startup(snapshot(vec![active_with_pid("id", 55)]));

        assert_eq!(report.launched, vec!["id"]);
        let calls = h.launcher.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].command, "ctc backup-links start-one --force");
        assert_eq!(calls[0].args, vec!["--id", "id"]);
        assert!(h.orchestrator.is_ongoing("id"));
    }

    #[tokio::test]
    async fn test_mixed_startup() {
        let mut h = harness(Duration::from_secs(3600));
        let report = h.orchestrator.startup(snapshot(vec![
            record("a1", BackupLinkStatus::Active),
            record("a2", BackupLinkStatus::Active),
            record("p1", BackupLinkStatus::Pending),
            record("p2", BackupLinkStatus::Pending),
        ]));

        assert_eq!(report.launched, vec!["a1", "a2"]);
        assert_eq!(report.scheduled, vec!["p1", "p2"]);
        assert_eq!(h.launcher.calls().len(), 2);
        assert_eq!(h.orchestrator.stats().timers_armed, 2);
        assert_eq!(h.orchestrator.scheduled_count(), 2);
        assert_eq!(h.orchestrator.ongoing_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_moves_id_to_ongoing_without_rearm() {
        let mut h = harness(Duration::from_secs(10));
        let snap = snapshot(vec![record("p", BackupLinkStatus::Pending)]);
        h.orchestrator.startup(snap.clone());

        let fired = h.orchestrator.next_timer().await.unwrap();
        let report = h.orchestrator.handle_timer(fired);
        assert_eq!(report.launched, vec!["p"]);
        assert!(h.orchestrator.is_ongoing("p"));
        assert!(!h.orchestrator.is_scheduled("p"));

        // 存储中仍为 PENDING，也不能重新排期
        h.orchestrator.converge(&snap);
        h.orchestrator.handle_store_change(snap.clone());
        assert_eq!(h.orchestrator.stats().timers_armed, 1);

        // 工作进程写入 ACTIVE 和自己的进程号
        h.orchestrator
            .handle_store_change(snapshot(vec![active_with_pid("p", 1000)]));
        assert_eq!(h.launcher.calls().len(), 1);
        assert_eq!(h.orchestrator.stats().timers_armed, 1);

        // 工作进程报告完成后重新排期
        let report = h
            .orchestrator
            .handle_store_change(snapshot(vec![completed("p", 5_000)]));
        assert_eq!(report.scheduled, vec!["p"]);
        assert!(!h.orchestrator.is_ongoing("p"));
        assert!(h.orchestrator.is_scheduled("p"));
        assert_eq!(h.orchestrator.stats().timers_armed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_removal_while_running_terminates_once() {
        let mut h = harness_with(Box::new(FixedWait(Duration::from_secs(1))), 23);
        h.orchestrator
            .startup(snapshot(vec![record("id", BackupLinkStatus::Pending)]));

        let fired = h.orchestrator.next_timer().await.unwrap();
        h.orchestrator.handle_timer(fired);
        h.orchestrator
            .handle_store_change(snapshot(vec![active_with_pid("id", 23)]));
        let cancelled_before = h.orchestrator.stats().timers_cancelled;

        let report = h.orchestrator.handle_store_change(Snapshot::new());
        assert_eq!(report.cancelled, vec!["id"]);
        assert_eq!(h.terminator.killed(), vec![23]);
        assert_eq!(h.orchestrator.stats().timers_cancelled, cancelled_before);
        assert!(!h.orchestrator.is_ongoing("id"));
        assert_eq!(h.orchestrator.scheduled_count(), 0);
    }

    #[tokio::test]
    async fn test_removal_of_untracked_active_uses_record_pid() {
        let mut h = harness(Duration::from_secs(3600));
        h.launcher.set_fail(true);

        let report = h
            .orchestrator
            .startup(snapshot(vec![active_with_pid("id", 23)]));
        assert_eq!(report.failures.len(), 1);
        assert!(!h.orchestrator.is_ongoing("id"));

        h.orchestrator.handle_store_change(Snapshot::new());
        assert_eq!(h.terminator.killed(), vec![23]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_removal_while_scheduled_cancels_timer_once() {
        let mut h = harness(Duration::from_secs(3600));
        h.orchestrator
            .startup(snapshot(vec![record("p", BackupLinkStatus::Pending)]));

        h.orchestrator.handle_store_change(Snapshot::new());
        assert_eq!(h.orchestrator.stats().timers_cancelled, 1);
        assert!(h.terminator.killed().is_empty());
        assert!(!h.orchestrator.is_scheduled("p"));

        // 再次删除不会重复取消
        h.orchestrator.handle_store_change(Snapshot::new());
        assert_eq!(h.orchestrator.stats().timers_cancelled, 1);

        let fired =
            tokio::time::timeout(Duration::from_secs(7200), h.orchestrator.next_timer()).await;
        assert!(fired.is_err());
        assert!(h.launcher.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_waits_for_remaining_frequency() {
        let mut h = harness_with(Box::new(FrequencyWaitTime), 1000);
        let mut rec = record("id", BackupLinkStatus::Pending);
        rec.last_backup_timestamp = Some(chrono::Utc::now().timestamp_millis() - 30 * 60 * 1000);
        h.orchestrator.startup(snapshot(vec![rec]));
        assert!(h.launcher.calls().is_empty());

        let start = Instant::now();
        let fired = h.orchestrator.next_timer().await.unwrap();
        let waited = start.elapsed();
        assert!(waited > Duration::from_secs(29 * 60));
        assert!(waited <= Duration::from_secs(30 * 60));
        assert!(h.launcher.calls().is_empty());

        h.orchestrator.handle_timer(fired);
        assert_eq!(
            h.launcher.calls(),
            vec![WorkerCommand {
                command: "ctc backup-links start-one --force".to_string(),
                args: vec!["--id".to_string(), "id".to_string()],
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_overdue_link_fires_immediately() {
        let mut h = harness_with(Box::new(FrequencyWaitTime), 1000);
        let mut rec = record("id", BackupLinkStatus::Pending);
        rec.last_backup_timestamp = Some(chrono::Utc::now().timestamp_millis() - 60 * 60 * 1000);
        h.orchestrator.startup(snapshot(vec![rec]));

        let start = Instant::now();
        let fired = h.orchestrator.next_timer().await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
        h.orchestrator.handle_timer(fired);
        assert_eq!(h.launcher.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_with_cleared_pid_reschedules() {
        let mut h = harness_with(Box::new(FrequencyWaitTime), 1000);
        let now = chrono::Utc::now().timestamp_millis();

        let mut running = active_with_pid("myId", 12);
        running.last_backup_timestamp = Some(now - 60 * 60 * 1000);
        h.orchestrator.startup(snapshot(vec![running]));
        assert_eq!(h.launcher.calls().len(), 1);

        // 状态仍为 ACTIVE，但进程号被清除且时间戳刷新
        let mut done = record("myId", BackupLinkStatus::Active);
        done.last_backup_timestamp = Some(now);
        let report = h.orchestrator.handle_store_change(snapshot(vec![done]));

        assert_eq!(report.scheduled, vec!["myId"]);
        assert!(h.terminator.killed().is_empty());
        assert_eq!(h.orchestrator.stats().timers_cancelled, 0);
        assert_eq!(h.orchestrator.stats().timers_armed, 1);

        let start = Instant::now();
        let fired = h.orchestrator.next_timer().await.unwrap();
        assert!(start.elapsed() > Duration::from_secs(59 * 60));
        h.orchestrator.handle_timer(fired);

        let calls = h.launcher.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].args, vec!["--id", "myId"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_timer_launch_is_retried() {
        let mut h = harness(Duration::from_secs(5));
        h.orchestrator
            .startup(snapshot(vec![record("p", BackupLinkStatus::Pending)]));
        h.launcher.set_fail(true);

        let fired = h.orchestrator.next_timer().await.unwrap();
        let report = h.orchestrator.handle_timer(fired);
        assert_eq!(report.failures.len(), 1);
        assert!(!h.orchestrator.is_ongoing("p"));
        assert!(h.orchestrator.is_scheduled("p"));

        h.launcher.set_fail(false);
        let start = Instant::now();
        let fired = h.orchestrator.next_timer().await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(60));
        h.orchestrator.handle_timer(fired);
        assert!(h.orchestrator.is_ongoing("p"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_event_is_ignored() {
        let mut h = harness(Duration::from_secs(5));
        let before = snapshot(vec![record("p", BackupLinkStatus::Pending)]);
        h.orchestrator.startup(before.clone());

        let fired = h.orchestrator.next_timer().await.unwrap();

        // 到期事件还未处理时频率被修改，旧定时器作废
        let mut changed = record("p", BackupLinkStatus::Pending);
        changed.job_frequence_ms = "2h".to_string();
        h.orchestrator.handle_store_change(snapshot(vec![changed]));
        assert_eq!(h.orchestrator.stats().timers_armed, 2);

        let report = h.orchestrator.handle_timer(fired);
        assert!(report.is_empty());
        assert!(h.launcher.calls().is_empty());
        assert!(h.orchestrator.is_scheduled("p"));
    }

    #[tokio::test]
    async fn test_bad_record_does_not_block_others() {
        let mut h = harness_with(Box::new(FrequencyWaitTime), 1000);
        let mut bad = record("bad", BackupLinkStatus::Pending);
        bad.job_frequence_ms = "whenever".to_string();
        let good = record("good", BackupLinkStatus::Pending);

        let report = h.orchestrator.startup(snapshot(vec![bad.clone(), good.clone()]));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "bad");
        assert!(report.failures[0].1.is_config());
        assert!(h.orchestrator.is_scheduled("good"));
        assert!(!h.orchestrator.is_scheduled("bad"));

        // 修正后在下一次通知中重试
        let mut fixed = bad;
        fixed.job_frequence_ms = "1h".to_string();
        let report = h.orchestrator.handle_store_change(snapshot(vec![fixed, good]));
        assert_eq!(report.scheduled, vec!["bad"]);
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_externally_started_run_is_adopted() {
        let mut h = harness(Duration::from_secs(3600));
        h.orchestrator
            .startup(snapshot(vec![record("p", BackupLinkStatus::Pending)]));

        h.orchestrator
            .handle_store_change(snapshot(vec![active_with_pid("p", 77)]));
        assert_eq!(h.orchestrator.ongoing_pid("p"), Some(77));
        assert!(!h.orchestrator.is_scheduled("p"));
        assert!(h.launcher.calls().is_empty());

        h.orchestrator.handle_store_change(Snapshot::new());
        assert_eq!(h.terminator.killed(), vec![77]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_finished_between_polls_is_rescheduled() {
        let mut h = harness(Duration::from_secs(10));
        h.orchestrator
            .startup(snapshot(vec![record("p", BackupLinkStatus::Pending)]));

        let fired = h.orchestrator.next_timer().await.unwrap();
        h.orchestrator.handle_timer(fired);
        assert!(h.orchestrator.is_ongoing("p"));

        // ACTIVE 没有被观察到，只看到 PENDING 的时间戳前进
        let report = h
            .orchestrator
            .handle_store_change(snapshot(vec![completed("p", 5_000)]));
        assert_eq!(report.scheduled, vec!["p"]);
        assert!(!h.orchestrator.is_ongoing("p"));
        assert!(h.orchestrator.is_scheduled("p"));
        assert_eq!(h.orchestrator.stats().timers_armed, 2);
        assert!(h.terminator.killed().is_empty());

        let fired = h.orchestrator.next_timer().await.unwrap();
        h.orchestrator.handle_timer(fired);
        assert_eq!(h.launcher.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_frequency_change_while_running_keeps_run_tracked() {
        let mut h = harness(Duration::from_secs(10));
        h.orchestrator
            .startup(snapshot(vec![record("p", BackupLinkStatus::Pending)]));
        let fired = h.orchestrator.next_timer().await.unwrap();
        h.orchestrator.handle_timer(fired);

        let mut faster = record("p", BackupLinkStatus::Pending);
        faster.job_frequence_ms = "5m".to_string();
        let report = h.orchestrator.handle_store_change(snapshot(vec![faster]));

        assert!(report.scheduled.is_empty());
        assert!(h.orchestrator.is_ongoing("p"));
        assert!(!h.orchestrator.is_scheduled("p"));
    }

    #[tokio::test]
    async fn test_undecodable_record_is_not_cancelled() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("backup-links.json");
        let store = BackupLinkStore::open(&path).unwrap();
        store.insert(&active_with_pid("a", 55)).unwrap();
        store.insert(&record("p", BackupLinkStatus::Pending)).unwrap();

        let mut h = harness(Duration::from_secs(3600));
        h.orchestrator.startup(store.read_snapshot().unwrap());
        assert_eq!(h.orchestrator.ongoing_pid("a"), Some(1000));
        assert!(h.orchestrator.is_scheduled("p"));

        let original = std::fs::read_to_string(&path).unwrap();
        std::fs::write(
            &path,
            original
                .replace("\"ACTIVE\"", "\"ACTIV\"")
                .replace("\"PENDING\"", "\"PENDIN\""),
        )
        .unwrap();

        let report = h
            .orchestrator
            .handle_store_change(store.read_snapshot().unwrap());
        assert!(report.cancelled.is_empty());
        assert_eq!(report.failures.len(), 2);
        assert!(report.failures.iter().all(|(_, e)| e.is_config()));
        assert!(h.terminator.killed().is_empty());
        assert_eq!(h.orchestrator.ongoing_pid("a"), Some(1000));
        assert!(h.orchestrator.is_scheduled("p"));
        assert_eq!(h.orchestrator.stats().timers_cancelled, 0);

        // 记录恢复后不会重复启动或重复排期
        std::fs::write(&path, &original).unwrap();
        let report = h
            .orchestrator
            .handle_store_change(store.read_snapshot().unwrap());
        assert!(report.is_empty());
        assert_eq!(h.launcher.calls().len(), 1);
        assert_eq!(h.orchestrator.stats().timers_armed, 1);

        // 真正删除时才终止
        store.remove("a").unwrap();
        h.orchestrator
            .handle_store_change(store.read_snapshot().unwrap());
        assert_eq!(h.terminator.killed(), vec![1000]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watcher_and_orchestrator_reschedule_quick_run() {
        let temp_dir = tempdir().unwrap();
        let store = BackupLinkStore::open(temp_dir.path().join("backup-links.json")).unwrap();
        store.insert(&record("p", BackupLinkStatus::Pending)).unwrap();

        let mut h = harness(Duration::from_secs(10));
        let initial = store.read_snapshot().unwrap();
        h.orchestrator.startup(initial.clone());
        let mut watcher =
            StoreWatcher::spawn(Arc::new(store.clone()), initial, Duration::from_secs(1));

        let fired = h.orchestrator.next_timer().await.unwrap();
        h.orchestrator.handle_timer(fired);
        assert!(h.orchestrator.is_ongoing("p"));

        // 同一个轮询间隔内，工作进程写入 ACTIVE 又写回 PENDING
        store
            .modify("p", |r| {
                r.status = BackupLinkStatus::Active;
                r.process_pid = Some(1000);
            })
            .unwrap();
        store
            .modify("p", |r| {
                r.status = BackupLinkStatus::Pending;
                r.process_pid = None;
                r.last_backup_timestamp = Some(5_000);
            })
            .unwrap();

        let change = watcher.changed().await.unwrap();
        assert!(change.records["p"].is_pending());
        let report = h.orchestrator.handle_store_change(change);
        assert_eq!(report.scheduled, vec!["p"]);
        assert!(!h.orchestrator.is_ongoing("p"));

        let fired = h.orchestrator.next_timer().await.unwrap();
        h.orchestrator.handle_timer(fired);
        assert_eq!(h.launcher.calls().len(), 2);

        watcher.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_processes_changes_and_timers() {
        let h = harness(Duration::from_secs(1));
        let launcher = h.launcher.clone();
        let mut orchestrator = h.orchestrator;
        orchestrator.startup(Snapshot::new());

        let (change_tx, change_rx) = mpsc::channel(4);
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(orchestrator.run(change_rx, async {
            let _ = stop_rx.await;
        }));

        change_tx
            .send(snapshot(vec![record("p", BackupLinkStatus::Pending)]).into())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(launcher.calls().len(), 1);

        stop_tx.send(()).unwrap();
        task.await.unwrap();
    }
}
