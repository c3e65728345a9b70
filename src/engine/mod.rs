//! 媒体引擎适配层
//!
//! 控制器只通过 [`MediaEngine`] 操作引擎；引擎的异步状态变化通过
//! [`EngineCallbacks`] 送回控制线程，由控制器统一归一化。

mod rodio_engine;
mod simulated;

#[cfg(test)]
pub(crate) mod fake;

use std::sync::Arc;
use tokio::sync::mpsc;

pub use rodio_engine::{RodioEngine, RodioEngineFactory};
pub use simulated::{SimulatedEngine, SimulatedEngineFactory};

use crate::error::EngineError;
use crate::events::VideoSize;
use crate::settings::PlaybackSettings;

/// 引擎报告的播放状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Idle,
    Buffering,
    Ready,
    Ended,
}

/// 引擎原始回调
#[derive(Debug, Clone, PartialEq)]
pub enum EngineSignal {
    StateChanged(EngineState),
    IsPlayingChanged(bool),
    /// 位置跳变（seek 完成），单位毫秒
    PositionDiscontinuity { old_ms: i64, new_ms: i64 },
    Error(EngineError),
}

/// 带播放器标识的回调，经通道送回控制线程
#[derive(Debug, Clone, PartialEq)]
pub struct EngineMessage {
    pub player_id: Arc<str>,
    pub signal: EngineSignal,
}

/// 引擎持有的回调句柄，可跨线程发送
#[derive(Debug, Clone)]
pub struct EngineCallbacks {
    player_id: Arc<str>,
    tx: mpsc::UnboundedSender<EngineMessage>,
}

impl EngineCallbacks {
    pub fn new(player_id: &str, tx: mpsc::UnboundedSender<EngineMessage>) -> Self {
        Self {
            player_id: Arc::from(player_id),
            tx,
        }
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn emit(&self, signal: EngineSignal) {
        let msg = EngineMessage {
            player_id: Arc::clone(&self.player_id),
            signal,
        };
        if self.tx.send(msg).is_err() {
            tracing::debug!(player_id = %self.player_id, "control thread gone, dropping engine signal");
        }
    }
}

/// 引擎能力集合，控制器把它当作播放状态的唯一来源
///
/// 所有方法都在控制线程上调用；加载失败等问题通过回调异步报告。
pub trait MediaEngine {
    /// 加载新媒体并清除播放意图
    fn load(&mut self, uri: &str);
    fn set_play_when_ready(&mut self, play_when_ready: bool);
    fn play(&mut self);
    fn pause(&mut self);
    fn seek_to(&mut self, position_ms: u64);
    fn set_volume(&mut self, volume: f32);
    fn volume(&self) -> f32;
    fn current_position_ms(&self) -> u64;
    fn duration_ms(&self) -> Option<u64>;
    fn is_playing(&self) -> bool;
    fn state(&self) -> EngineState;
    fn video_size(&self) -> Option<VideoSize> {
        None
    }
    /// 释放底层资源；之后不会再有回调
    fn release(&mut self);
}

/// 在控制线程上构建引擎
pub trait EngineFactory {
    fn create(
        &mut self,
        player_id: &str,
        callbacks: EngineCallbacks,
    ) -> Result<Box<dyn MediaEngine>, EngineError>;
}

/// 引擎后端选择
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineBackend {
    /// rodio 本地文件播放
    Rodio,
    /// 无声模拟引擎（无音频设备/测试）
    Simulated,
}

impl EngineBackend {
    /// 构建工厂；必须在控制线程上调用
    pub fn build_factory(
        self,
        settings: &PlaybackSettings,
    ) -> Result<Box<dyn EngineFactory>, EngineError> {
        match self {
            EngineBackend::Rodio => Ok(Box::new(RodioEngineFactory::open_default()?)),
            EngineBackend::Simulated => Ok(Box::new(SimulatedEngineFactory::new(
                settings.simulated_duration_ms,
            ))),
        }
    }
}
