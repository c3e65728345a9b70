//! 控制线程
//!
//! 宿主命令经有界通道排队，在单一控制线程上依次执行；
//! 引擎回调与定时任务也在同一线程上处理，因此控制器状态无需加锁。

mod handle;
mod messages;
mod thread;

pub use handle::ControlHandle;
pub use messages::{HostCommand, Reply, SeekOutcome};
pub use thread::spawn_control_thread;
