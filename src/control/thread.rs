use tokio::select;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};

use super::handle::ControlHandle;
use super::messages::{HostCommand, SeekOutcome};
use crate::controller::PlaybackController;
use crate::engine::{EngineBackend, EngineCallbacks, EngineFactory, EngineMessage};
use crate::error::ControllerError;
use crate::events::{EventReceiver, EventSender};
use crate::registry::Registry;
use crate::settings::{PlaybackSettings, Timing};

const COMMAND_CAPACITY: usize = 64;
const THREAD_NAME: &str = "playback-control";

/// 控制线程主循环：宿主命令、引擎回调、定时任务三路复用
struct ControlLoop {
    rx_cmd: mpsc::Receiver<HostCommand>,
    tx_engine: mpsc::UnboundedSender<EngineMessage>,
    rx_engine: mpsc::UnboundedReceiver<EngineMessage>,
    tx_evt: EventSender,
    factory: Box<dyn EngineFactory>,
    registry: Registry,
    timing: Timing,
}

impl ControlLoop {
    fn new(
        rx_cmd: mpsc::Receiver<HostCommand>,
        tx_evt: EventSender,
        factory: Box<dyn EngineFactory>,
        timing: Timing,
    ) -> Self {
        let (tx_engine, rx_engine) = mpsc::unbounded_channel();
        Self {
            rx_cmd,
            tx_engine,
            rx_engine,
            tx_evt,
            factory,
            registry: Registry::new(),
            timing,
        }
    }

    async fn run(mut self) {
        loop {
            let deadline = self.registry.next_deadline();
            select! {
                biased;
                maybe_cmd = self.rx_cmd.recv() => {
                    let Some(cmd) = maybe_cmd else {
                        tracing::info!("所有句柄已释放，控制线程退出");
                        break;
                    };
                    if !self.handle_command(cmd) {
                        break;
                    }
                }
                Some(msg) = self.rx_engine.recv() => {
                    self.registry.dispatch_signal(msg);
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.registry.run_due(Instant::now());
                }
            }
        }

        self.flush_engine_signals();
        let disposed = self.registry.dispose_all();
        tracing::info!(disposed, "控制线程已停止");
    }

    /// 处理已排队的引擎回调，保证之前命令产生的事件在释放前送达
    fn flush_engine_signals(&mut self) {
        while let Ok(msg) = self.rx_engine.try_recv() {
            self.registry.dispatch_signal(msg);
        }
    }

    /// 返回 `false` 表示应退出循环
    fn handle_command(&mut self, cmd: HostCommand) -> bool {
        tracing::trace!(command = cmd.name(), "host command");
        match cmd {
            HostCommand::CreatePlayer { player_id, reply } => {
                let _ = reply.send(self.create_player(player_id));
            }
            HostCommand::DisposePlayer { player_id, reply } => {
                let res = self.registry.unregister(&player_id).map(|mut c| c.dispose());
                let _ = reply.send(res);
            }
            HostCommand::SetSource {
                player_id,
                source,
                reply,
            } => {
                let _ = reply.send(self.with_player(&player_id, |c| c.set_source(&source)));
            }
            HostCommand::Play { player_id, reply } => {
                let _ = reply.send(self.with_player(&player_id, PlaybackController::play));
            }
            HostCommand::Pause { player_id, reply } => {
                let _ = reply.send(self.with_player(&player_id, PlaybackController::pause));
            }
            HostCommand::SetLoop {
                player_id,
                looping,
                reply,
            } => {
                let _ = reply.send(self.with_player(&player_id, |c| c.set_loop(looping)));
            }
            HostCommand::SetVolume {
                player_id,
                volume,
                reply,
            } => {
                let _ = reply.send(self.with_player(&player_id, |c| c.set_volume(volume)));
            }
            HostCommand::Seek {
                player_id,
                position_seconds,
                reply,
            } => {
                let res = self.with_player(&player_id, |c| SeekOutcome {
                    seeked: c.seek(position_seconds),
                });
                let _ = reply.send(res);
            }
            HostCommand::FadeVolume {
                player_id,
                target,
                duration_seconds,
                reply,
            } => {
                let res =
                    self.with_player(&player_id, |c| c.fade_volume(target, duration_seconds));
                let _ = reply.send(res);
            }
            HostCommand::Shutdown { reply } => {
                self.flush_engine_signals();
                let disposed = self.registry.dispose_all();
                tracing::info!(disposed, "收到 shutdown");
                let _ = reply.send(Ok(disposed));
                return false;
            }
        }
        true
    }

    fn create_player(&mut self, player_id: String) -> Result<(), ControllerError> {
        if self.registry.contains(&player_id) {
            return Err(ControllerError::AlreadyRegistered(player_id));
        }
        let callbacks = EngineCallbacks::new(&player_id, self.tx_engine.clone());
        let engine = self.factory.create(&player_id, callbacks).map_err(|source| {
            tracing::warn!(player_id = %player_id, err = %source, "创建播放引擎失败");
            ControllerError::EngineUnavailable {
                id: player_id.clone(),
                source,
            }
        })?;
        tracing::info!(player_id = %player_id, "player created");
        let controller = PlaybackController::new(
            player_id,
            engine,
            Box::new(self.tx_evt.clone()),
            self.timing.clone(),
        );
        self.registry.register(controller)
    }

    fn with_player<T>(
        &mut self,
        player_id: &str,
        f: impl FnOnce(&mut PlaybackController) -> T,
    ) -> Result<T, ControllerError> {
        let controller = self.registry.get_mut(player_id).inspect_err(|_| {
            tracing::debug!(player_id, "command for unknown player");
        })?;
        Ok(f(controller))
    }
}

/// 启动控制线程，等待引擎后端就绪后返回句柄和事件流
///
/// 控制线程独占一个 current-thread runtime；引擎在其上构建，不需要 `Send`。
/// 后端初始化失败（如没有音频设备）时返回 [`ControllerError::Startup`]。
pub async fn spawn_control_thread(
    backend: EngineBackend,
    settings: &PlaybackSettings,
) -> Result<(ControlHandle, EventReceiver), ControllerError> {
    let (tx_cmd, rx_cmd) = mpsc::channel::<HostCommand>(COMMAND_CAPACITY);
    let (tx_evt, rx_evt) = mpsc::unbounded_channel();
    let (tx_ready, rx_ready) = oneshot::channel::<Result<(), ControllerError>>();
    let settings = settings.clone();

    std::thread::Builder::new()
        .name(THREAD_NAME.to_owned())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!(err = %e, "初始化控制线程 runtime 失败");
                    let _ = tx_ready.send(Err(ControllerError::ThreadSpawn(e)));
                    return;
                }
            };
            let local = tokio::task::LocalSet::new();
            local.block_on(&rt, async move {
                let factory = match backend.build_factory(&settings) {
                    Ok(f) => f,
                    Err(e) => {
                        tracing::error!(?backend, err = %e, "初始化播放后端失败");
                        let _ = tx_ready.send(Err(ControllerError::Startup(e)));
                        return;
                    }
                };
                tracing::info!(?backend, "控制线程已启动");
                let _ = tx_ready.send(Ok(()));

                ControlLoop::new(rx_cmd, tx_evt, factory, Timing::from(&settings))
                    .run()
                    .await;
            });
        })?;

    rx_ready
        .await
        .map_err(|_| ControllerError::ControlThreadClosed)??;
    Ok((ControlHandle::new(tx_cmd), rx_evt))
}
