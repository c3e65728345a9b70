//! 引擎回调归一化
//!
//! | 引擎信号 | 相位 | 事件 | 副作用 |
//! |---|---|---|---|
//! | buffering | Buffering | `ON_BUFFERING` | - |
//! | ready | Ready | `ON_LOAD` | - |
//! | ended | Ended | `ON_END` | 循环时回到 0 并继续播放 |
//! | idle | Idle | `ON_STALLED` | - |
//! | is-playing → true | - | `ON_PLAY` | 启动进度上报 |
//! | is-playing → false | - | `ON_PAUSE` | 停止进度上报 |
//! | 位置跳变 | - | `ON_SEEK` | 新旧位置都 ≤ 0 时不上报 |
//! | 错误 | - | `ON_ERROR` | 不自动恢复 |

use tokio::time::Instant;

use super::{PlaybackController, ProgressTask, ms_to_seconds};
use crate::engine::{EngineSignal, EngineState};
use crate::error::EngineError;
use crate::events::{Capabilities, EventPayload};

/// 控制器镜像的引擎播放相位，初始为 `Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackPhase {
    #[default]
    Idle,
    Buffering,
    Ready,
    Ended,
}

impl From<EngineState> for PlaybackPhase {
    fn from(state: EngineState) -> Self {
        match state {
            EngineState::Idle => PlaybackPhase::Idle,
            EngineState::Buffering => PlaybackPhase::Buffering,
            EngineState::Ready => PlaybackPhase::Ready,
            EngineState::Ended => PlaybackPhase::Ended,
        }
    }
}

impl PlaybackController {
    /// 处理一条引擎回调；引擎已释放时忽略
    pub fn handle_signal(&mut self, signal: EngineSignal) {
        if self.engine.is_none() {
            tracing::debug!(player_id = %self.id, ?signal, "signal after dispose ignored");
            return;
        }
        match signal {
            EngineSignal::StateChanged(state) => self.on_state_changed(state),
            EngineSignal::IsPlayingChanged(playing) => self.on_is_playing_changed(playing),
            EngineSignal::PositionDiscontinuity { old_ms, new_ms } => {
                self.on_position_discontinuity(old_ms, new_ms)
            }
            EngineSignal::Error(err) => self.on_engine_error(err),
        }
    }

    fn on_state_changed(&mut self, state: EngineState) {
        self.phase = PlaybackPhase::from(state);
        match state {
            EngineState::Buffering => self.emit(EventPayload::Buffering),
            EngineState::Ready => {
                let payload = self.load_payload();
                self.emit(payload);
            }
            EngineState::Ended => {
                self.emit(EventPayload::End);
                if self.looping {
                    self.restart_loop();
                }
            }
            EngineState::Idle => self.emit(EventPayload::Stalled),
        }
    }

    fn restart_loop(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        tracing::debug!(player_id = %self.id, "loop restart");
        engine.seek_to(0);
        engine.play();
        self.paused = false;
    }

    fn load_payload(&self) -> EventPayload {
        let (duration_ms, position_ms, video_size) = self
            .engine
            .as_ref()
            .map(|e| (e.duration_ms(), e.current_position_ms(), e.video_size()))
            .unwrap_or((None, 0, None));
        EventPayload::Load {
            duration: duration_ms.map(ms_to_seconds).unwrap_or(0.0),
            current_time: ms_to_seconds(position_ms),
            capabilities: Capabilities::ALL,
            video_size,
        }
    }

    fn on_is_playing_changed(&mut self, playing: bool) {
        if playing == self.engine_playing {
            return;
        }
        self.engine_playing = playing;
        if playing {
            self.emit(EventPayload::Play);
            self.progress = Some(ProgressTask::start(
                Instant::now(),
                self.timing.progress_interval,
            ));
        } else {
            self.emit(EventPayload::Pause);
            self.progress = None;
        }
    }

    fn on_position_discontinuity(&mut self, old_ms: i64, new_ms: i64) {
        // 初次加载时的 0 -> 0 跳变不算 seek
        if old_ms <= 0 && new_ms <= 0 {
            tracing::debug!(player_id = %self.id, "zero position discontinuity suppressed");
            return;
        }
        self.emit(EventPayload::Seek {
            seek_time: new_ms.max(0) as f64 / 1000.0,
        });
    }

    fn on_engine_error(&mut self, err: EngineError) {
        tracing::warn!(player_id = %self.id, code = err.code, message = %err.message, "engine error");
        self.emit(EventPayload::Error {
            error_code: err.code,
            error_message: err.message,
        });
    }
}
