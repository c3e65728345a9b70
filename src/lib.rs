//! 多实例媒体播放控制
//!
//! 宿主通过 [`control::ControlHandle`] 按标识符操作播放器，
//! 播放器状态变化以 [`events::PlayerEvent`] 的形式推送回宿主。

pub mod cli;
pub mod control;
pub mod controller;
pub mod engine;
pub mod error;
pub mod events;
pub mod host;
pub mod logging;
pub mod registry;
pub mod settings;
