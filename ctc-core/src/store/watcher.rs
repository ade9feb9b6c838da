use super::{RecordStore, StoreSnapshot};
use crate::constants::daemon;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

/// 存储变更订阅
///
/// 写入方是其他进程（工作进程、命令行），所以这里按固定间隔轮询存储，
/// 只有快照与上一次不同时才发送新快照。
pub struct StoreWatcher {
    receiver: mpsc::Receiver<StoreSnapshot>,
    handle: JoinHandle<()>,
}

impl StoreWatcher {
    /// 启动轮询任务，`initial` 为订阅方已经处理过的快照
    pub fn spawn(
        store: Arc<dyn RecordStore>,
        initial: StoreSnapshot,
        poll_interval: Duration,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(daemon::CHANGE_CHANNEL_CAPACITY);
        let handle = tokio::spawn(watch_loop(store, initial, poll_interval, sender));

        Self { receiver, handle }
    }

    /// 等待下一次变更，轮询任务结束时返回 None
    pub async fn changed(&mut self) -> Option<StoreSnapshot> {
        self.receiver.recv().await
    }

    pub fn into_receiver(self) -> mpsc::Receiver<StoreSnapshot> {
        self.receiver
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}

async fn watch_loop(
    store: Arc<dyn RecordStore>,
    mut last: StoreSnapshot,
    poll_interval: Duration,
    sender: mpsc::Sender<StoreSnapshot>,
) {
    info!(interval_ms = poll_interval.as_millis() as u64, "开始监听备份链接存储");

    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let current = match store.read_snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "读取备份链接存储失败，等待下一次轮询");
                continue;
            }
        };

        if current == last {
            continue;
        }

        debug!(
            records = current.records.len(),
            invalid = current.invalid.len(),
            "检测到备份链接存储变更"
        );
        if sender.send(current.clone()).await.is_err() {
            debug!("变更订阅方已关闭，停止监听");
            break;
        }
        last = current;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup_link::model::fixtures::{record, snapshot};
    use crate::backup_link::{BackupLinkStatus, BackupLinkStore, Snapshot};
    use crate::error::Result;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct MemoryStore {
        snapshot: Mutex<Snapshot>,
    }

    impl RecordStore for MemoryStore {
        fn read_snapshot(&self) -> Result<StoreSnapshot> {
            Ok(self.snapshot.lock().unwrap().clone().into())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_emits_only_on_change() {
        let store = Arc::new(MemoryStore {
            snapshot: Mutex::new(Snapshot::new()),
        });
        let mut watcher = StoreWatcher::spawn(
            store.clone(),
            StoreSnapshot::default(),
            Duration::from_millis(100),
        );

        let changed = snapshot(vec![record("a", BackupLinkStatus::Pending)]);
        *store.snapshot.lock().unwrap() = changed.clone();

        let received = watcher.changed().await.unwrap();
        assert_eq!(received.records, changed);
        assert!(received.invalid.is_empty());

        // 没有新的变化时不应再收到通知
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(watcher.receiver.try_recv().is_err());

        *store.snapshot.lock().unwrap() = Snapshot::new();
        assert_eq!(watcher.changed().await.unwrap(), StoreSnapshot::default());

        watcher.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_between_polls_arrive_as_one_snapshot() {
        let temp_dir = tempdir().unwrap();
        let store = BackupLinkStore::open(temp_dir.path().join("links.json")).unwrap();
        store.insert(&record("p", BackupLinkStatus::Pending)).unwrap();

        let initial = store.read_snapshot().unwrap();
        let mut watcher = StoreWatcher::spawn(
            Arc::new(store.clone()),
            initial,
            Duration::from_secs(1),
        );
        tokio::time::sleep(Duration::from_millis(1500)).await;

        // 工作进程先写 ACTIVE，随后很快写回 PENDING
        store
            .modify("p", |r| {
                r.status = BackupLinkStatus::Active;
                r.process_pid = Some(4242);
            })
            .unwrap();
        store
            .modify("p", |r| {
                r.status = BackupLinkStatus::Pending;
                r.process_pid = None;
                r.last_backup_timestamp = Some(5_000);
            })
            .unwrap();

        let received = watcher.changed().await.unwrap();
        let p = &received.records["p"];
        assert_eq!(p.status, BackupLinkStatus::Pending);
        assert_eq!(p.last_backup_timestamp, Some(5_000));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(watcher.receiver.try_recv().is_err());

        watcher.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_undecodable_records() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("links.json");
        let store = BackupLinkStore::open(&path).unwrap();
        store.insert(&record("a", BackupLinkStatus::Active)).unwrap();

        let initial = store.read_snapshot().unwrap();
        let mut watcher = StoreWatcher::spawn(
            Arc::new(store.clone()),
            initial,
            Duration::from_millis(100),
        );

        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, content.replace("\"ACTIVE\"", "\"ACTIV\"")).unwrap();

        let received = watcher.changed().await.unwrap();
        assert!(received.records.is_empty());
        assert!(received.invalid.contains("a"));

        watcher.abort();
    }
}
