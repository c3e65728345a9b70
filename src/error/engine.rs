//! 播放引擎错误
//!
//! 引擎错误永远是异步的：它们只会以 `ON_ERROR` 事件的形式到达宿主，
//! 不会通过命令返回值抛回。

/// 引擎侧错误码
pub mod code {
    /// 不支持的来源（协议或格式）
    pub const UNSUPPORTED_SOURCE: i32 = 1001;
    /// 打开媒体失败
    pub const OPEN_FAILED: i32 = 1002;
    /// 解码失败
    pub const DECODE_FAILED: i32 = 1003;
    /// Seek 失败
    pub const SEEK_FAILED: i32 = 1004;
    /// 音频输出设备不可用
    pub const OUTPUT_UNAVAILABLE: i32 = 1005;
}

/// 引擎报告的错误：错误码 + 描述
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("引擎错误({code}): {message}")]
pub struct EngineError {
    pub code: i32,
    pub message: String,
}

impl EngineError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unsupported_source(uri: &str) -> Self {
        Self::new(code::UNSUPPORTED_SOURCE, format!("不支持的来源: {uri}"))
    }
}
