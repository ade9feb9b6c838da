use crate::backup_link::Snapshot;

/// 两次快照之间的差异，按ID分类
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// 新出现的ID
    pub added: Vec<String>,
    /// 已从存储中删除的ID
    pub removed: Vec<String>,
    /// 一次执行刚刚结束
    pub completed: Vec<String>,
    /// 由 PENDING 变为 ACTIVE 并带有进程号，通常是手动执行的 start-one
    pub started: Vec<String>,
    /// 仍为 PENDING，但执行频率或上次备份时间被修改
    pub rescheduled: Vec<String>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.completed.is_empty()
            && self.started.is_empty()
            && self.rescheduled.is_empty()
    }
}

/// 比较前后两次快照
///
/// 每个ID至多出现在一个分类中；没有影响调度的变化（例如改名）不会被报告。
pub fn diff_snapshots(previous: &Snapshot, next: &Snapshot) -> SnapshotDiff {
    let mut diff = SnapshotDiff::default();

    for (id, old) in previous {
        if !next.contains_key(id) {
            diff.removed.push(id.clone());
            continue;
        }
        let new = &next[id];

        if new.completed_since(old) {
            diff.completed.push(id.clone());
        } else if old.is_pending() && new.is_active() && new.process_pid.is_some() {
            diff.started.push(id.clone());
        } else if old.is_pending()
            && new.is_pending()
            && (old.job_frequence_ms != new.job_frequence_ms
                || old.last_backup_timestamp != new.last_backup_timestamp)
        {
            diff.rescheduled.push(id.clone());
        }
    }

    for id in next.keys() {
        if !previous.contains_key(id) {
            diff.added.push(id.clone());
        }
    }

    diff
}
