use tokio::sync::oneshot;

use crate::controller::SourceOptions;
use crate::error::ControllerError;

/// 命令的同步结果，由控制线程回传
pub type Reply<T> = oneshot::Sender<Result<T, ControllerError>>;

#[derive(Debug)]
pub enum HostCommand {
    CreatePlayer {
        player_id: String,
        reply: Reply<()>,
    },
    DisposePlayer {
        player_id: String,
        reply: Reply<()>,
    },
    SetSource {
        player_id: String,
        source: SourceOptions,
        reply: Reply<()>,
    },
    Play {
        player_id: String,
        reply: Reply<()>,
    },
    Pause {
        player_id: String,
        reply: Reply<()>,
    },
    SetLoop {
        player_id: String,
        looping: bool,
        reply: Reply<()>,
    },
    SetVolume {
        player_id: String,
        volume: f32,
        reply: Reply<()>,
    },
    Seek {
        player_id: String,
        position_seconds: f64,
        reply: Reply<SeekOutcome>,
    },
    FadeVolume {
        player_id: String,
        target: f32,
        duration_seconds: f64,
        reply: Reply<()>,
    },
    /// 释放全部播放器并退出控制线程，回传释放数量
    Shutdown { reply: Reply<usize> },
}

impl HostCommand {
    pub fn name(&self) -> &'static str {
        match self {
            HostCommand::CreatePlayer { .. } => "createPlayer",
            HostCommand::DisposePlayer { .. } => "disposePlayer",
            HostCommand::SetSource { .. } => "setSource",
            HostCommand::Play { .. } => "play",
            HostCommand::Pause { .. } => "pause",
            HostCommand::SetLoop { .. } => "setLoop",
            HostCommand::SetVolume { .. } => "setVolume",
            HostCommand::Seek { .. } => "seek",
            HostCommand::FadeVolume { .. } => "fadeVolume",
            HostCommand::Shutdown { .. } => "shutdown",
        }
    }
}

/// `seek` 的结果：位置未变时为 `false`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekOutcome {
    pub seeked: bool,
}
