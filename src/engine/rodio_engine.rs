use rodio::mixer::Mixer;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use super::{EngineCallbacks, EngineFactory, EngineSignal, EngineState, MediaEngine};
use crate::error::{EngineError, code};

struct ActiveSink {
    sink: Arc<Sink>,
    end_cancel: Arc<AtomicBool>,
    /// 重建 sink 时跳过的起点，`get_pos` 从 0 开始计
    offset: Duration,
}

/// rodio 本地文件引擎，每个播放器一个 `Sink`
pub struct RodioEngine {
    mixer: Mixer,
    callbacks: EngineCallbacks,
    current: Option<ActiveSink>,
    path: Option<PathBuf>,
    duration_ms: Option<u64>,
    state: EngineState,
    play_when_ready: bool,
    volume: f32,
}

impl RodioEngine {
    pub fn new(mixer: Mixer, callbacks: EngineCallbacks) -> Self {
        Self {
            mixer,
            callbacks,
            current: None,
            path: None,
            duration_ms: None,
            state: EngineState::Idle,
            play_when_ready: false,
            volume: 1.0,
        }
    }

    fn current_sink(&self) -> Option<&Arc<Sink>> {
        self.current.as_ref().map(|cur| &cur.sink)
    }

    fn stop_current(&mut self) {
        if let Some(cur) = self.current.take() {
            tracing::debug!(
                player_id = self.callbacks.player_id(),
                "stopping sink, signaling end check thread to cancel"
            );
            cur.end_cancel.store(true, Ordering::Relaxed);
            cur.sink.stop();
        }
    }

    fn attach_sink(&mut self, sink: Arc<Sink>, offset: Duration) {
        let cancel = Arc::new(AtomicBool::new(false));
        let sink_end = Arc::clone(&sink);
        let cancel_end = Arc::clone(&cancel);
        let callbacks = self.callbacks.clone();
        let thread_name = format!("playback-end-check-{}", self.callbacks.player_id());

        // 线程创建失败只会丢失结束检测，播放本身不受影响
        let spawned = thread::Builder::new().name(thread_name).spawn(move || {
            sink_end.sleep_until_end();
            if cancel_end.load(Ordering::Relaxed) {
                tracing::debug!(player_id = callbacks.player_id(), "end check thread was cancelled");
                return;
            }
            tracing::debug!(player_id = callbacks.player_id(), "end of media");
            callbacks.emit(EngineSignal::StateChanged(EngineState::Ended));
            callbacks.emit(EngineSignal::IsPlayingChanged(false));
        });
        if let Err(e) = spawned {
            tracing::warn!(
                player_id = self.callbacks.player_id(),
                err = %e,
                "failed to spawn end check thread, end of media will not be reported"
            );
        }

        self.current = Some(ActiveSink {
            sink,
            end_cancel: cancel,
            offset,
        });
    }

    /// 以当前播放意图和音量重建 sink
    fn rebuild_at(&mut self, path: &Path, seek: Option<Duration>) -> Result<(), EngineError> {
        self.stop_current();
        let (sink, duration_ms) = build_sink_from_path(&self.mixer, path, seek)?;
        sink.set_volume(self.volume);
        if self.play_when_ready {
            sink.play();
        } else {
            sink.pause();
        }
        if seek.is_none() {
            self.duration_ms = duration_ms;
        }
        self.attach_sink(Arc::new(sink), seek.unwrap_or_default());
        Ok(())
    }
}

impl MediaEngine for RodioEngine {
    fn load(&mut self, uri: &str) {
        let was_playing = self.is_playing();
        self.stop_current();
        self.path = None;
        self.duration_ms = None;
        self.play_when_ready = false;
        if was_playing {
            self.callbacks.emit(EngineSignal::IsPlayingChanged(false));
        }

        let path = match resolve_path(uri) {
            Ok(p) => p,
            Err(e) => {
                self.state = EngineState::Idle;
                self.callbacks.emit(EngineSignal::Error(e));
                return;
            }
        };

        self.state = EngineState::Buffering;
        self.callbacks
            .emit(EngineSignal::StateChanged(EngineState::Buffering));

        match self.rebuild_at(&path, None) {
            Ok(()) => {
                tracing::debug!(
                    player_id = self.callbacks.player_id(),
                    path = %path.display(),
                    duration_ms = ?self.duration_ms,
                    "media loaded"
                );
                self.path = Some(path);
                self.state = EngineState::Ready;
                self.callbacks
                    .emit(EngineSignal::StateChanged(EngineState::Ready));
            }
            Err(e) => {
                self.state = EngineState::Idle;
                self.callbacks.emit(EngineSignal::Error(e));
            }
        }
    }

    fn set_play_when_ready(&mut self, play_when_ready: bool) {
        if play_when_ready {
            self.play();
        } else {
            self.pause();
        }
    }

    fn play(&mut self) {
        self.play_when_ready = true;
        let Some(sink) = self.current_sink() else {
            return;
        };
        if sink.is_paused() && !sink.empty() {
            sink.play();
            self.callbacks.emit(EngineSignal::IsPlayingChanged(true));
        }
    }

    fn pause(&mut self) {
        self.play_when_ready = false;
        let was_playing = self.is_playing();
        if let Some(sink) = self.current_sink() {
            sink.pause();
        }
        if was_playing {
            self.callbacks.emit(EngineSignal::IsPlayingChanged(false));
        }
    }

    fn seek_to(&mut self, position_ms: u64) {
        let Some(path) = self.path.clone() else {
            return;
        };
        let was_playing = self.is_playing();
        let old_ms = self.current_position_ms();
        let target = Duration::from_millis(position_ms);

        let seeked_in_place = match self.current.as_mut() {
            Some(cur) if !cur.sink.empty() => match cur.sink.try_seek(target) {
                Ok(()) => {
                    cur.offset = Duration::ZERO;
                    true
                }
                Err(e) => {
                    tracing::debug!(err = %e, position_ms, "in-place seek failed, rebuilding sink");
                    false
                }
            },
            _ => false,
        };

        if !seeked_in_place && let Err(e) = self.rebuild_at(&path, Some(target)) {
            tracing::warn!(position_ms, err = %e, "seek failed");
            self.callbacks.emit(EngineSignal::Error(EngineError::new(
                code::SEEK_FAILED,
                e.message,
            )));
            return;
        }
        self.state = EngineState::Ready;

        self.callbacks.emit(EngineSignal::PositionDiscontinuity {
            old_ms: old_ms as i64,
            new_ms: position_ms as i64,
        });
        let now_playing = self.is_playing();
        if now_playing != was_playing {
            self.callbacks
                .emit(EngineSignal::IsPlayingChanged(now_playing));
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(sink) = self.current_sink() {
            sink.set_volume(self.volume);
        }
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn current_position_ms(&self) -> u64 {
        self.current
            .as_ref()
            .map(|cur| (cur.offset + cur.sink.get_pos()).as_millis() as u64)
            .unwrap_or(0)
    }

    fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    fn is_playing(&self) -> bool {
        self.current_sink()
            .is_some_and(|sink| !sink.is_paused() && !sink.empty())
    }

    fn state(&self) -> EngineState {
        match self.current_sink() {
            Some(sink) if self.state == EngineState::Ready && sink.empty() => EngineState::Ended,
            _ => self.state,
        }
    }

    fn release(&mut self) {
        self.stop_current();
        self.path = None;
        self.duration_ms = None;
        self.state = EngineState::Idle;
        self.play_when_ready = false;
        tracing::debug!(player_id = self.callbacks.player_id(), "rodio engine released");
    }
}

impl Drop for RodioEngine {
    fn drop(&mut self) {
        self.stop_current();
    }
}

/// 持有默认输出流；所有播放器共享同一个 mixer
pub struct RodioEngineFactory {
    mixer: Mixer,
    _stream: OutputStream,
}

impl RodioEngineFactory {
    pub fn open_default() -> Result<Self, EngineError> {
        let stream = OutputStreamBuilder::open_default_stream().map_err(|e| {
            EngineError::new(code::OUTPUT_UNAVAILABLE, format!("初始化音频输出失败: {e}"))
        })?;
        let mixer = stream.mixer().clone();
        Ok(Self {
            mixer,
            _stream: stream,
        })
    }
}

impl EngineFactory for RodioEngineFactory {
    fn create(
        &mut self,
        player_id: &str,
        callbacks: EngineCallbacks,
    ) -> Result<Box<dyn MediaEngine>, EngineError> {
        tracing::debug!(player_id, "build rodio engine");
        Ok(Box::new(RodioEngine::new(self.mixer.clone(), callbacks)))
    }
}

/// 本地路径或 `file://`；其它协议不支持
fn resolve_path(uri: &str) -> Result<PathBuf, EngineError> {
    if let Some(rest) = uri.strip_prefix("file://") {
        return Ok(PathBuf::from(rest));
    }
    if uri.trim().is_empty() || uri.contains("://") {
        return Err(EngineError::unsupported_source(uri));
    }
    Ok(PathBuf::from(uri))
}

fn build_sink_from_path(
    mixer: &Mixer,
    path: &Path,
    seek: Option<Duration>,
) -> Result<(Sink, Option<u64>), EngineError> {
    let file = File::open(path).map_err(|e| {
        EngineError::new(
            code::OPEN_FAILED,
            format!("打开媒体文件失败({}): {e}", path.display()),
        )
    })?;
    let decoder = Decoder::new(BufReader::new(file)).map_err(|e| {
        EngineError::new(
            code::DECODE_FAILED,
            format!("解码失败({}): {e}", path.display()),
        )
    })?;
    let duration_ms = decoder.total_duration().map(|d| d.as_millis() as u64);
    let source: Box<dyn Source + Send> = if let Some(seek) = seek {
        Box::new(decoder.skip_duration(seek))
    } else {
        Box::new(decoder)
    };

    let sink = Sink::connect_new(mixer);
    sink.append(source);
    Ok((sink, duration_ms))
}
