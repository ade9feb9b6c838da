use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// 定时器到期事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerFired {
    pub id: String,
    /// 区分同一ID先后挂起的定时器，过期的事件直接丢弃
    pub generation: u64,
}

/// 一次性定时器
///
/// 到期后向事件通道发送 [`TimerFired`]。取消或丢弃句柄会中止等待任务，
/// 已经到期的定时器再取消不会产生任何效果。
#[derive(Debug)]
pub struct TimerHandle {
    generation: u64,
    wait: Duration,
    abort: AbortHandle,
}

impl TimerHandle {
    pub fn arm(
        id: String,
        generation: u64,
        wait: Duration,
        events: mpsc::UnboundedSender<TimerFired>,
    ) -> Self {
        let task = tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            let _ = events.send(TimerFired { id, generation });
        });

        Self {
            generation,
            wait,
            abort: task.abort_handle(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 挂起时设定的等待时长
    pub fn wait(&self) -> Duration {
        self.wait
    }

    pub fn cancel(&self) {
        self.abort.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.abort.abort();
    }
}
