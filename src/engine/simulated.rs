use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{EngineCallbacks, EngineFactory, EngineSignal, EngineState, MediaEngine};
use crate::error::{EngineError, code};
use crate::events::VideoSize;

const VIDEO_EXTENSIONS: [&str; 4] = [".mp4", ".mov", ".webm", ".m3u8"];

/// 无声引擎：按时钟推进位置，信号序列与真实引擎一致
///
/// 以 `error:` 开头的 URI 会加载失败。加载会清除播放意图，
/// 需要之后再调用 `set_play_when_ready`。
pub struct SimulatedEngine {
    callbacks: EngineCallbacks,
    duration_ms: u64,
    uri: Option<String>,
    state: EngineState,
    play_when_ready: bool,
    volume: f32,
    base_ms: u64,
    resumed_at: Option<Instant>,
    end_timer: Option<JoinHandle<()>>,
}

impl SimulatedEngine {
    pub fn new(callbacks: EngineCallbacks, duration_ms: u64) -> Self {
        Self {
            callbacks,
            duration_ms: duration_ms.max(1),
            uri: None,
            state: EngineState::Idle,
            play_when_ready: false,
            volume: 1.0,
            base_ms: 0,
            resumed_at: None,
            end_timer: None,
        }
    }

    fn clock_position(&self) -> u64 {
        let running = self
            .resumed_at
            .map(|at| at.elapsed().as_millis() as u64)
            .unwrap_or(0);
        self.base_ms.saturating_add(running).min(self.duration_ms)
    }

    fn stop_clock(&mut self) {
        self.base_ms = self.clock_position();
        self.resumed_at = None;
        if let Some(timer) = self.end_timer.take() {
            timer.abort();
        }
    }

    fn start_clock(&mut self) {
        self.resumed_at = Some(Instant::now());
        let remaining = Duration::from_millis(self.duration_ms.saturating_sub(self.base_ms));
        let callbacks = self.callbacks.clone();
        self.end_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(remaining).await;
            callbacks.emit(EngineSignal::StateChanged(EngineState::Ended));
            callbacks.emit(EngineSignal::IsPlayingChanged(false));
        }));
    }

    fn can_run(&self) -> bool {
        self.uri.is_some()
            && self.state == EngineState::Ready
            && self.play_when_ready
            && self.base_ms < self.duration_ms
    }
}

impl MediaEngine for SimulatedEngine {
    fn load(&mut self, uri: &str) {
        let was_playing = self.is_playing();
        self.stop_clock();
        self.base_ms = 0;
        self.play_when_ready = false;
        if was_playing {
            self.callbacks.emit(EngineSignal::IsPlayingChanged(false));
        }

        if uri.starts_with("error:") || uri.trim().is_empty() {
            self.uri = None;
            self.state = EngineState::Idle;
            self.callbacks.emit(EngineSignal::Error(EngineError::new(
                code::OPEN_FAILED,
                format!("无法打开媒体: {uri}"),
            )));
            return;
        }

        self.uri = Some(uri.to_owned());
        self.state = EngineState::Buffering;
        self.callbacks
            .emit(EngineSignal::StateChanged(EngineState::Buffering));
        self.state = EngineState::Ready;
        self.callbacks
            .emit(EngineSignal::StateChanged(EngineState::Ready));
    }

    fn set_play_when_ready(&mut self, play_when_ready: bool) {
        if play_when_ready {
            self.play();
        } else {
            self.pause();
        }
    }

    fn play(&mut self) {
        self.play_when_ready = true;
        if self.is_playing() {
            return;
        }
        self.stop_clock();
        if self.can_run() {
            self.start_clock();
            self.callbacks.emit(EngineSignal::IsPlayingChanged(true));
        }
    }

    fn pause(&mut self) {
        self.play_when_ready = false;
        let was_playing = self.is_playing();
        self.stop_clock();
        if was_playing {
            self.callbacks.emit(EngineSignal::IsPlayingChanged(false));
        }
    }

    fn seek_to(&mut self, position_ms: u64) {
        if self.uri.is_none() {
            return;
        }
        let was_playing = self.is_playing();
        let old_ms = self.clock_position();
        self.stop_clock();
        self.base_ms = position_ms.min(self.duration_ms);
        self.callbacks.emit(EngineSignal::PositionDiscontinuity {
            old_ms: old_ms as i64,
            new_ms: self.base_ms as i64,
        });

        // 落在末尾与计时器到期一样上报结束
        if self.base_ms >= self.duration_ms {
            self.callbacks
                .emit(EngineSignal::StateChanged(EngineState::Ended));
            if was_playing {
                self.callbacks.emit(EngineSignal::IsPlayingChanged(false));
            }
            return;
        }

        if self.can_run() {
            self.start_clock();
            if !was_playing {
                self.callbacks.emit(EngineSignal::IsPlayingChanged(true));
            }
        } else if was_playing {
            self.callbacks.emit(EngineSignal::IsPlayingChanged(false));
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn current_position_ms(&self) -> u64 {
        self.clock_position()
    }

    fn duration_ms(&self) -> Option<u64> {
        self.uri.as_ref().map(|_| self.duration_ms)
    }

    fn is_playing(&self) -> bool {
        self.resumed_at.is_some() && self.clock_position() < self.duration_ms
    }

    fn state(&self) -> EngineState {
        if self.uri.is_some() && self.clock_position() >= self.duration_ms {
            EngineState::Ended
        } else {
            self.state
        }
    }

    fn video_size(&self) -> Option<VideoSize> {
        let uri = self.uri.as_deref()?.to_ascii_lowercase();
        VIDEO_EXTENSIONS
            .iter()
            .any(|ext| uri.ends_with(ext))
            .then_some(VideoSize {
                width: 1280,
                height: 720,
            })
    }

    fn release(&mut self) {
        self.stop_clock();
        self.uri = None;
        self.state = EngineState::Idle;
        self.play_when_ready = false;
        tracing::debug!(player_id = self.callbacks.player_id(), "simulated engine released");
    }
}

impl Drop for SimulatedEngine {
    fn drop(&mut self) {
        if let Some(timer) = self.end_timer.take() {
            timer.abort();
        }
    }
}

/// 模拟引擎工厂
#[derive(Debug, Clone)]
pub struct SimulatedEngineFactory {
    duration_ms: u64,
}

impl SimulatedEngineFactory {
    pub fn new(duration_ms: u64) -> Self {
        Self { duration_ms }
    }
}

impl EngineFactory for SimulatedEngineFactory {
    fn create(
        &mut self,
        player_id: &str,
        callbacks: EngineCallbacks,
    ) -> Result<Box<dyn MediaEngine>, EngineError> {
        tracing::debug!(player_id, duration_ms = self.duration_ms, "build simulated engine");
        Ok(Box::new(SimulatedEngine::new(callbacks, self.duration_ms)))
    }
}
