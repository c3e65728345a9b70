//! 行分隔 JSON 宿主协议
//!
//! 每行一个请求 `{"id", "method", "params"}`，每个回复和事件各占一行输出。
//! 输入结束时释放全部播放器，排空事件后返回。

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::select;

use crate::control::ControlHandle;
use crate::controller::SourceOptions;
use crate::error::{AppError, ControllerError};
use crate::events::EventReceiver;

pub const BAD_REQUEST: &str = "E_BAD_REQUEST";

/// 宿主可调用的方法
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(
    tag = "method",
    content = "params",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum HostCall {
    CreatePlayer {
        player_id: String,
    },
    DisposePlayer {
        player_id: String,
    },
    SetSource {
        player_id: String,
        #[serde(flatten)]
        source: SourceOptions,
    },
    Play {
        player_id: String,
    },
    Pause {
        player_id: String,
    },
    SetLoop {
        player_id: String,
        #[serde(rename = "loop")]
        looping: bool,
    },
    SetVolume {
        player_id: String,
        volume: f32,
    },
    Seek {
        player_id: String,
        time: f64,
        /// 宿主 API 的容差参数；按毫秒精确 seek，只接收不使用
        #[serde(default)]
        tolerance: Option<f64>,
    },
    FadeVolume {
        player_id: String,
        target: f32,
        duration_seconds: f64,
    },
    Shutdown,
}

impl HostCall {
    pub async fn execute(self, handle: &ControlHandle) -> Result<Value, ControllerError> {
        match self {
            HostCall::CreatePlayer { player_id } => {
                handle.create_player(player_id.clone()).await?;
                return Ok(Value::String(player_id));
            }
            HostCall::DisposePlayer { player_id } => handle.dispose_player(player_id).await?,
            HostCall::SetSource { player_id, source } => {
                handle.set_source(player_id, source).await?
            }
            HostCall::Play { player_id } => handle.play(player_id).await?,
            HostCall::Pause { player_id } => handle.pause(player_id).await?,
            HostCall::SetLoop { player_id, looping } => handle.set_loop(player_id, looping).await?,
            HostCall::SetVolume { player_id, volume } => {
                handle.set_volume(player_id, volume).await?
            }
            HostCall::Seek {
                player_id,
                time,
                tolerance,
            } => {
                if tolerance.is_some() {
                    tracing::trace!(?tolerance, "seek tolerance ignored");
                }
                let outcome = handle.seek(player_id, time).await?;
                return Ok(json!({ "seeked": outcome.seeked }));
            }
            HostCall::FadeVolume {
                player_id,
                target,
                duration_seconds,
            } => {
                handle
                    .fade_volume(player_id, target, duration_seconds)
                    .await?
            }
            HostCall::Shutdown => {
                let disposed = handle.shutdown().await?;
                return Ok(json!({ "disposed": disposed }));
            }
        }
        Ok(Value::Bool(true))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HostReply {
    Ok { id: Value, ok: Value },
    Err { id: Value, error: ErrorBody },
}

impl HostReply {
    fn bad_request(id: Value, err: &serde_json::Error) -> Self {
        HostReply::Err {
            id,
            error: ErrorBody {
                code: BAD_REQUEST.to_owned(),
                message: format!("请求格式错误: {err}"),
            },
        }
    }

    fn from_error(id: Value, err: &ControllerError) -> Self {
        HostReply::Err {
            id,
            error: ErrorBody {
                code: err.code().to_owned(),
                message: err.to_string(),
            },
        }
    }
}

/// 解析一行请求；`id` 单独取出以便出错时也能回显
pub fn parse_request(line: &str) -> (Value, Result<HostCall, serde_json::Error>) {
    let mut value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => return (Value::Null, Err(e)),
    };
    let id = value
        .as_object_mut()
        .and_then(|obj| obj.remove("id"))
        .unwrap_or(Value::Null);
    (id, serde_json::from_value(value))
}

pub async fn handle_line(handle: &ControlHandle, line: &str) -> HostReply {
    let (id, call) = parse_request(line);
    let call = match call {
        Ok(call) => call,
        Err(e) => {
            tracing::warn!(err = %e, "malformed host request");
            return HostReply::bad_request(id, &e);
        }
    };
    tracing::debug!(?id, ?call, "host request");
    match call.execute(handle).await {
        Ok(ok) => HostReply::Ok { id, ok },
        Err(e) => {
            tracing::debug!(?id, code = e.code(), err = %e, "host request failed");
            HostReply::from_error(id, &e)
        }
    }
}

async fn write_line<W, T>(writer: &mut W, value: &T) -> Result<(), AppError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut buf = serde_json::to_vec(value)?;
    buf.push(b'\n');
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// 运行协议循环，直到事件流关闭
pub async fn serve<R, W>(
    handle: ControlHandle,
    events: EventReceiver,
    reader: R,
    writer: W,
) -> Result<(), AppError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    serve_until(handle, events, reader, writer, std::future::pending()).await
}

/// 同 [`serve`]，`stop` 完成时停止读取输入并关闭控制线程，
/// 已排队的事件仍会写出后再返回
pub async fn serve_until<R, W, S>(
    handle: ControlHandle,
    mut events: EventReceiver,
    reader: R,
    mut writer: W,
    stop: S,
) -> Result<(), AppError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    S: Future<Output = ()>,
{
    let mut lines = reader.lines();
    let mut input_open = true;
    tokio::pin!(stop);

    loop {
        select! {
            biased;
            maybe_evt = events.recv() => {
                let Some(evt) = maybe_evt else {
                    break;
                };
                write_line(&mut writer, &evt).await?;
            }
            _ = &mut stop, if input_open => {
                input_open = false;
                tracing::info!("stop requested, shutting down");
                shutdown(&handle).await;
            }
            line = lines.next_line(), if input_open => {
                match line? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => {
                        let reply = handle_line(&handle, &line).await;
                        write_line(&mut writer, &reply).await?;
                    }
                    None => {
                        input_open = false;
                        tracing::info!("host input closed, shutting down");
                        shutdown(&handle).await;
                    }
                }
            }
        }
    }

    writer.flush().await?;
    Ok(())
}

async fn shutdown(handle: &ControlHandle) {
    match handle.shutdown().await {
        Ok(disposed) => tracing::info!(disposed, "shutdown complete"),
        Err(e) => tracing::debug!(err = %e, "control thread already stopped"),
    }
}
