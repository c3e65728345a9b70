use std::time::Duration;
use tokio::time::Instant;

/// 播放进度上报，仅在引擎处于播放中时存在
#[derive(Debug, Clone)]
pub struct ProgressTask {
    next_tick: Instant,
    interval: Duration,
}

impl ProgressTask {
    /// 首次上报立即到期
    pub fn start(now: Instant, interval: Duration) -> Self {
        Self {
            next_tick: now,
            interval,
        }
    }

    pub fn due(&self) -> Instant {
        self.next_tick
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next_tick <= now
    }

    pub fn rearm(&mut self, now: Instant) {
        self.next_tick = now + self.interval;
    }
}
