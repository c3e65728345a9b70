//! 控制器命令错误

use super::EngineError;

/// 宿主命令的同步失败
///
/// `NotFound` 与其它失败分开，宿主据此区分"标识符无效"和"操作失败"。
/// 引擎已释放或尚未构建不算错误：命令静默忽略。
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// 标识符未注册
    #[error("播放器不存在: {0}")]
    NotFound(String),

    /// 标识符已被占用
    #[error("播放器已存在: {0}")]
    AlreadyRegistered(String),

    /// 引擎工厂无法构建引擎
    #[error("创建播放引擎失败({id}): {source}")]
    EngineUnavailable {
        id: String,
        #[source]
        source: EngineError,
    },

    /// 控制线程启动失败
    #[error("控制线程启动失败: {0}")]
    Startup(#[source] EngineError),

    /// 创建控制线程失败
    #[error("创建控制线程失败: {0}")]
    ThreadSpawn(#[from] std::io::Error),

    /// 控制线程已退出
    #[error("控制线程已关闭")]
    ControlThreadClosed,
}

impl ControllerError {
    /// 面向宿主的稳定错误码
    pub fn code(&self) -> &'static str {
        match self {
            ControllerError::NotFound(_) => "E_PLAYER_NOT_FOUND",
            ControllerError::AlreadyRegistered(_) => "E_PLAYER_EXISTS",
            ControllerError::EngineUnavailable { .. } | ControllerError::Startup(_) => {
                "E_ENGINE_UNAVAILABLE"
            }
            ControllerError::ThreadSpawn(_) | ControllerError::ControlThreadClosed => {
                "E_CONTROL_CLOSED"
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ControllerError::NotFound(_))
    }
}
