use std::time::Duration;
use tokio::time::Instant;

use crate::settings::Timing;

/// 一次淡入淡出：首个 tick 在初始停顿之后，之后按固定节奏推进
#[derive(Debug, Clone)]
pub struct FadeTask {
    target: f32,
    duration_secs: f64,
    initial: f32,
    started_at: Instant,
    next_tick: Instant,
    tick: Duration,
}

/// 单个 tick 的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FadeStep {
    /// 写入新音量，继续调度
    Volume(f32),
    /// 已到达目标，停止
    Complete,
}

impl FadeTask {
    pub fn new(target: f32, duration_secs: f64, initial: f32, now: Instant, timing: &Timing) -> Self {
        Self {
            target,
            duration_secs,
            initial,
            started_at: now,
            next_tick: now + timing.fade_initial_delay,
            tick: timing.fade_tick,
        }
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn due(&self) -> Instant {
        self.next_tick
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next_tick <= now
    }

    pub fn reschedule(&mut self, now: Instant) {
        self.next_tick = now + self.tick;
    }

    /// 二次缓入：上升按 `t² × target`，下降从起始音量减去 `t²`，都不越过目标
    pub fn step(&self, current: f32, now: Instant) -> FadeStep {
        let elapsed = now.saturating_duration_since(self.started_at).as_secs_f64();
        let fraction = elapsed / self.duration_secs;
        let eased = fraction * fraction;
        let target = f64::from(self.target);

        if current < self.target {
            FadeStep::Volume((eased * target).min(target) as f32)
        } else if current > self.target {
            FadeStep::Volume((f64::from(self.initial) - eased).max(target) as f32)
        } else {
            FadeStep::Complete
        }
    }
}
