use tokio::sync::{mpsc, oneshot};

use super::messages::{HostCommand, Reply, SeekOutcome};
use crate::controller::SourceOptions;
use crate::error::ControllerError;

/// 宿主侧句柄：任意线程可克隆使用，命令排队到控制线程串行执行
///
/// 所有句柄都被丢弃后，控制线程释放全部播放器并退出。
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<HostCommand>,
}

impl ControlHandle {
    pub(crate) fn new(tx: mpsc::Sender<HostCommand>) -> Self {
        Self { tx }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> HostCommand,
    ) -> Result<T, ControllerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| ControllerError::ControlThreadClosed)?;
        rx.await.map_err(|_| ControllerError::ControlThreadClosed)?
    }

    pub async fn create_player(&self, player_id: impl Into<String>) -> Result<(), ControllerError> {
        let player_id = player_id.into();
        self.request(|reply| HostCommand::CreatePlayer { player_id, reply })
            .await
    }

    pub async fn dispose_player(&self, player_id: impl Into<String>) -> Result<(), ControllerError> {
        let player_id = player_id.into();
        self.request(|reply| HostCommand::DisposePlayer { player_id, reply })
            .await
    }

    pub async fn set_source(
        &self,
        player_id: impl Into<String>,
        source: SourceOptions,
    ) -> Result<(), ControllerError> {
        let player_id = player_id.into();
        self.request(|reply| HostCommand::SetSource {
            player_id,
            source,
            reply,
        })
        .await
    }

    pub async fn play(&self, player_id: impl Into<String>) -> Result<(), ControllerError> {
        let player_id = player_id.into();
        self.request(|reply| HostCommand::Play { player_id, reply })
            .await
    }

    pub async fn pause(&self, player_id: impl Into<String>) -> Result<(), ControllerError> {
        let player_id = player_id.into();
        self.request(|reply| HostCommand::Pause { player_id, reply })
            .await
    }

    pub async fn set_loop(
        &self,
        player_id: impl Into<String>,
        looping: bool,
    ) -> Result<(), ControllerError> {
        let player_id = player_id.into();
        self.request(|reply| HostCommand::SetLoop {
            player_id,
            looping,
            reply,
        })
        .await
    }

    pub async fn set_volume(
        &self,
        player_id: impl Into<String>,
        volume: f32,
    ) -> Result<(), ControllerError> {
        let player_id = player_id.into();
        self.request(|reply| HostCommand::SetVolume {
            player_id,
            volume,
            reply,
        })
        .await
    }

    pub async fn seek(
        &self,
        player_id: impl Into<String>,
        position_seconds: f64,
    ) -> Result<SeekOutcome, ControllerError> {
        let player_id = player_id.into();
        self.request(|reply| HostCommand::Seek {
            player_id,
            position_seconds,
            reply,
        })
        .await
    }

    pub async fn fade_volume(
        &self,
        player_id: impl Into<String>,
        target: f32,
        duration_seconds: f64,
    ) -> Result<(), ControllerError> {
        let player_id = player_id.into();
        self.request(|reply| HostCommand::FadeVolume {
            player_id,
            target,
            duration_seconds,
            reply,
        })
        .await
    }

    /// 释放全部播放器并停止控制线程；返回释放的数量
    pub async fn shutdown(&self) -> Result<usize, ControllerError> {
        self.request(|reply| HostCommand::Shutdown { reply }).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
