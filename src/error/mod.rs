//! 统一错误处理模块
//!
//! 按关注点拆分：控制器命令错误、引擎异步错误、应用/设置错误。

mod app;
mod controller;
mod engine;

pub use app::{AppError, SettingsError};
pub use controller::ControllerError;
pub use engine::{EngineError, code};
