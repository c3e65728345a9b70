//! 播放控制器
//!
//! 每个播放会话一个控制器：独占一个引擎实例，持有全部可变状态，
//! 把引擎回调归一化为事件，并驱动淡入淡出与进度上报两个定时任务。
//! 所有方法都在控制线程上串行调用。

mod fade;
mod normalize;
mod progress;

use serde::Deserialize;
use std::collections::HashMap;
use tokio::time::Instant;

pub use fade::{FadeStep, FadeTask};
pub use normalize::PlaybackPhase;
pub use progress::ProgressTask;

use crate::engine::MediaEngine;
use crate::events::{EventPayload, EventSink, PlayerEvent};
use crate::settings::Timing;

/// `setSource` 的参数
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceOptions {
    pub url: String,
    #[serde(default)]
    pub autoplay: bool,
    #[serde(default)]
    pub volume: Option<f32>,
    /// 仅记录，引擎可以忽略
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl SourceOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = autoplay;
        self
    }

    pub fn volume(mut self, volume: f32) -> Self {
        self.volume = Some(volume);
        self
    }
}

pub struct PlaybackController {
    id: String,
    engine: Option<Box<dyn MediaEngine>>,
    sink: Box<dyn EventSink>,
    timing: Timing,
    paused: bool,
    volume: f32,
    looping: bool,
    phase: PlaybackPhase,
    engine_playing: bool,
    fade: Option<FadeTask>,
    progress: Option<ProgressTask>,
}

impl PlaybackController {
    pub fn new(
        id: impl Into<String>,
        engine: Box<dyn MediaEngine>,
        sink: Box<dyn EventSink>,
        timing: Timing,
    ) -> Self {
        let volume = timing.default_volume;
        Self {
            id: id.into(),
            engine: Some(engine),
            sink,
            timing,
            paused: false,
            volume,
            looping: false,
            phase: PlaybackPhase::Idle,
            engine_playing: false,
            fade: None,
            progress: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_disposed(&self) -> bool {
        self.engine.is_none()
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    pub fn is_reporting_progress(&self) -> bool {
        self.progress.is_some()
    }

    pub fn set_source(&mut self, source: &SourceOptions) {
        // 新来源取代进行中的淡变，不恢复音量
        self.cancel_fade(false);
        let Some(engine) = self.engine.as_mut() else {
            tracing::debug!(player_id = %self.id, "set_source ignored: engine absent");
            return;
        };

        tracing::info!(
            player_id = %self.id,
            uri = %source.url,
            autoplay = source.autoplay,
            volume = ?source.volume,
            headers = source.headers.len(),
            "set source"
        );
        engine.load(&source.url);
        self.paused = !source.autoplay;
        engine.set_play_when_ready(source.autoplay);

        if let Some(v) = source.volume.and_then(clamp_volume) {
            self.volume = v;
            engine.set_volume(v);
        }
    }

    pub fn play(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        self.paused = false;
        engine.play();
    }

    pub fn pause(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        self.paused = true;
        engine.pause();
    }

    /// 非有限值（NaN/∞）忽略
    pub fn set_volume(&mut self, volume: f32) {
        if self.engine.is_none() {
            return;
        }
        let Some(volume) = clamp_volume(volume) else {
            tracing::debug!(player_id = %self.id, volume, "set_volume ignored: non-finite");
            return;
        };
        self.cancel_fade(false);
        self.volume = volume;
        if let Some(engine) = self.engine.as_mut() {
            engine.set_volume(volume);
        }
    }

    /// 只记录，直到观察到播放结束才生效
    pub fn set_loop(&mut self, looping: bool) {
        if self.engine.is_none() {
            return;
        }
        self.looping = looping;
    }

    /// 目标位置与当前位置（毫秒精度）相同时不 seek，返回 `false`
    pub fn seek(&mut self, target_seconds: f64) -> bool {
        let Some(current_ms) = self.engine.as_ref().map(|e| e.current_position_ms()) else {
            tracing::debug!(player_id = %self.id, "seek ignored: engine absent");
            return false;
        };
        let target_ms = seconds_to_ms(target_seconds);
        if target_ms == current_ms {
            tracing::debug!(player_id = %self.id, position_ms = current_ms, "seek debounced");
            return false;
        }

        self.cancel_fade(true);
        if let Some(engine) = self.engine.as_mut() {
            tracing::debug!(
                player_id = %self.id,
                from_ms = current_ms,
                position_ms = target_ms,
                "seek"
            );
            engine.seek_to(target_ms);
        }
        true
    }

    pub fn fade_volume(&mut self, target: f32, duration_seconds: f64) {
        if !(duration_seconds.is_finite() && duration_seconds > 0.0) {
            tracing::debug!(player_id = %self.id, duration_seconds, "fade ignored: non-positive duration");
            return;
        }
        let Some(target) = clamp_volume(target) else {
            tracing::debug!(player_id = %self.id, target, "fade ignored: non-finite target");
            return;
        };
        let Some(initial) = self.engine.as_ref().map(|e| e.volume()) else {
            tracing::debug!(player_id = %self.id, "fade ignored: engine absent");
            return;
        };

        self.cancel_fade(false);
        tracing::info!(
            player_id = %self.id,
            from = initial,
            target,
            duration_seconds,
            "fade start"
        );
        self.fade = Some(FadeTask::new(
            target,
            duration_seconds,
            initial,
            Instant::now(),
            &self.timing,
        ));
    }

    /// 可重复调用
    pub fn dispose(&mut self) {
        self.cancel_fade(false);
        self.progress = None;
        if let Some(mut engine) = self.engine.take() {
            engine.release();
            tracing::info!(player_id = %self.id, "player disposed");
        }
        self.paused = false;
        self.looping = false;
        self.volume = self.timing.default_volume;
        self.engine_playing = false;
        self.phase = PlaybackPhase::Idle;
    }

    /// 最近一个到期的定时任务
    pub fn next_deadline(&self) -> Option<Instant> {
        let fade = self.fade.as_ref().map(FadeTask::due);
        let progress = self.progress.as_ref().map(ProgressTask::due);
        match (fade, progress) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// 执行所有已到期的定时任务
    pub fn run_due(&mut self, now: Instant) {
        if self.progress.as_ref().is_some_and(|p| p.is_due(now)) {
            self.tick_progress(now);
        }
        if self.fade.as_ref().is_some_and(|f| f.is_due(now)) {
            self.tick_fade(now);
        }
    }

    fn tick_progress(&mut self, now: Instant) {
        let Some(engine) = self.engine.as_ref() else {
            self.progress = None;
            return;
        };
        if !engine.is_playing() {
            self.progress = None;
            return;
        }
        let payload = EventPayload::Progress {
            current_time: ms_to_seconds(engine.current_position_ms()),
            duration: engine.duration_ms().map(ms_to_seconds).unwrap_or(0.0),
        };
        if let Some(progress) = self.progress.as_mut() {
            progress.rearm(now);
        }
        self.emit(payload);
    }

    fn tick_fade(&mut self, now: Instant) {
        let Some(engine) = self.engine.as_mut() else {
            self.fade = None;
            return;
        };
        let Some(fade) = self.fade.as_mut() else {
            return;
        };
        match fade.step(engine.volume(), now) {
            FadeStep::Volume(v) => {
                engine.set_volume(v);
                fade.reschedule(now);
            }
            FadeStep::Complete => {
                let target = fade.target();
                self.volume = target;
                self.fade = None;
                tracing::info!(player_id = %self.id, volume = target, "fade complete");
            }
        }
    }

    /// `restore` 为真时把权威音量写回引擎
    fn cancel_fade(&mut self, restore: bool) {
        if self.fade.take().is_none() {
            return;
        }
        tracing::debug!(player_id = %self.id, restore, volume = self.volume, "fade cancelled");
        if restore && let Some(engine) = self.engine.as_mut() {
            engine.set_volume(self.volume);
        }
    }

    fn emit(&self, payload: EventPayload) {
        self.sink.emit(PlayerEvent::new(self.id.clone(), payload));
    }
}

fn seconds_to_ms(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0) as u64
    } else {
        0
    }
}

fn ms_to_seconds(ms: u64) -> f64 {
    ms as f64 / 1000.0
}

/// 夹到 [0, 1]；`clamp` 会原样放过 NaN，这里直接拒绝
fn clamp_volume(volume: f32) -> Option<f32> {
    volume.is_finite().then(|| volume.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests;
