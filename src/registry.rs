//! 播放器注册表：按 id 持有控制器，只在控制线程上访问

use std::collections::HashMap;
use tokio::time::Instant;

use crate::controller::PlaybackController;
use crate::engine::EngineMessage;
use crate::error::ControllerError;

#[derive(Default)]
pub struct Registry {
    players: HashMap<String, PlaybackController>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.players.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn register(&mut self, controller: PlaybackController) -> Result<(), ControllerError> {
        let id = controller.id().to_owned();
        if self.players.contains_key(&id) {
            return Err(ControllerError::AlreadyRegistered(id));
        }
        tracing::debug!(player_id = %id, total = self.players.len() + 1, "player registered");
        self.players.insert(id, controller);
        Ok(())
    }

    /// 移除并返回控制器；调用方负责 dispose
    pub fn unregister(&mut self, id: &str) -> Result<PlaybackController, ControllerError> {
        self.players
            .remove(id)
            .ok_or_else(|| ControllerError::NotFound(id.to_owned()))
    }

    pub fn get_mut(&mut self, id: &str) -> Result<&mut PlaybackController, ControllerError> {
        self.players
            .get_mut(id)
            .ok_or_else(|| ControllerError::NotFound(id.to_owned()))
    }

    /// 释放全部播放器，返回释放数量
    pub fn dispose_all(&mut self) -> usize {
        let count = self.players.len();
        for (_, mut controller) in self.players.drain() {
            controller.dispose();
        }
        if count > 0 {
            tracing::info!(count, "all players disposed");
        }
        count
    }

    /// 把引擎回调交给对应控制器；播放器已注销时丢弃
    pub fn dispatch_signal(&mut self, msg: EngineMessage) {
        match self.players.get_mut(&*msg.player_id) {
            Some(controller) => controller.handle_signal(msg.signal),
            None => tracing::debug!(
                player_id = %msg.player_id,
                signal = ?msg.signal,
                "signal for unknown player dropped"
            ),
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.players
            .values()
            .filter_map(PlaybackController::next_deadline)
            .min()
    }

    pub fn run_due(&mut self, now: Instant) {
        for controller in self.players.values_mut() {
            controller.run_due(now);
        }
    }
}
