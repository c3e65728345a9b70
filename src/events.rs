//! 宿主可见的事件词汇
//!
//! 引擎的原始回调全部归一化为 [`EventPayload`] 中的固定集合，
//! 通过 [`EventSink`] 单向投递给宿主。投递失败不影响播放。

use serde::Serialize;
use std::fmt;
use tokio::sync::mpsc;

pub type EventSender = mpsc::UnboundedSender<PlayerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<PlayerEvent>;

/// 媒体能力标记（随 `ON_LOAD` 一起上报）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub can_play_reverse: bool,
    pub can_play_fast_forward: bool,
    pub can_play_slow_forward: bool,
    pub can_play_slow_reverse: bool,
    pub can_step_backward: bool,
    pub can_step_forward: bool,
}

impl Capabilities {
    pub const ALL: Capabilities = Capabilities {
        can_play_reverse: true,
        can_play_fast_forward: true,
        can_play_slow_forward: true,
        can_play_slow_reverse: true,
        can_step_backward: true,
        can_step_forward: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VideoSize {
    pub width: u32,
    pub height: u32,
}

/// 事件负载，时间单位均为秒
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "eventType")]
pub enum EventPayload {
    #[serde(rename = "ON_LOAD", rename_all = "camelCase")]
    Load {
        duration: f64,
        current_time: f64,
        #[serde(flatten)]
        capabilities: Capabilities,
        #[serde(flatten)]
        video_size: Option<VideoSize>,
    },
    #[serde(rename = "ON_BUFFERING")]
    Buffering,
    #[serde(rename = "ON_END")]
    End,
    #[serde(rename = "ON_STALLED")]
    Stalled,
    #[serde(rename = "ON_PLAY")]
    Play,
    #[serde(rename = "ON_PAUSE")]
    Pause,
    #[serde(rename = "ON_PROGRESS", rename_all = "camelCase")]
    Progress { current_time: f64, duration: f64 },
    #[serde(rename = "ON_SEEK", rename_all = "camelCase")]
    Seek { seek_time: f64 },
    #[serde(rename = "ON_ERROR", rename_all = "camelCase")]
    Error { error_code: i32, error_message: String },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Load { .. } => EventKind::Load,
            EventPayload::Buffering => EventKind::Buffering,
            EventPayload::End => EventKind::End,
            EventPayload::Stalled => EventKind::Stalled,
            EventPayload::Play => EventKind::Play,
            EventPayload::Pause => EventKind::Pause,
            EventPayload::Progress { .. } => EventKind::Progress,
            EventPayload::Seek { .. } => EventKind::Seek,
            EventPayload::Error { .. } => EventKind::Error,
        }
    }
}

/// 不带负载的事件类型，便于匹配和日志
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Load,
    Buffering,
    End,
    Stalled,
    Play,
    Pause,
    Progress,
    Seek,
    Error,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Load => "ON_LOAD",
            EventKind::Buffering => "ON_BUFFERING",
            EventKind::End => "ON_END",
            EventKind::Stalled => "ON_STALLED",
            EventKind::Play => "ON_PLAY",
            EventKind::Pause => "ON_PAUSE",
            EventKind::Progress => "ON_PROGRESS",
            EventKind::Seek => "ON_SEEK",
            EventKind::Error => "ON_ERROR",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 发往宿主的一条事件
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEvent {
    pub player_id: String,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl PlayerEvent {
    pub fn new(player_id: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            player_id: player_id.into(),
            payload,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

/// 事件出口：单向、不阻塞、失败即丢弃
pub trait EventSink {
    fn emit(&self, event: PlayerEvent);
}

impl EventSink for EventSender {
    fn emit(&self, event: PlayerEvent) {
        if let Err(e) = self.send(event) {
            tracing::debug!(
                player_id = %e.0.player_id,
                event = %e.0.kind(),
                "event sink closed, dropping event"
            );
        }
    }
}
