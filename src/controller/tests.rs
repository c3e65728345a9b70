use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, advance};

use super::*;
use crate::engine::fake::{EngineCall, FakeEngine, FakeState};
use crate::engine::{EngineSignal, EngineState};
use crate::error::{EngineError, code};
use crate::events::{EventKind, EventReceiver, VideoSize};

fn controller() -> (PlaybackController, Rc<RefCell<FakeState>>, EventReceiver) {
    let (engine, state) = FakeEngine::new();
    let (tx, rx) = mpsc::unbounded_channel();
    let c = PlaybackController::new("p1", Box::new(engine), Box::new(tx), Timing::default());
    (c, state, rx)
}

fn drain(rx: &mut EventReceiver) -> Vec<PlayerEvent> {
    let mut out = Vec::new();
    while let Ok(evt) = rx.try_recv() {
        out.push(evt);
    }
    out
}

fn kinds(rx: &mut EventReceiver) -> Vec<EventKind> {
    drain(rx).iter().map(PlayerEvent::kind).collect()
}

/// 逐个 tick 推进，直到没有定时任务或超出上限
async fn run_for(c: &mut PlaybackController, total: Duration) {
    let end = Instant::now() + total;
    while let Some(deadline) = c.next_deadline() {
        if deadline > end {
            break;
        }
        let now = Instant::now();
        if deadline > now {
            advance(deadline - now).await;
        }
        c.run_due(Instant::now());
    }
    let now = Instant::now();
    if end > now {
        advance(end - now).await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_dispose_twice_is_idempotent() {
    let (mut c, state, _rx) = controller();
    c.set_loop(true);
    c.set_volume(0.4);
    c.pause();
    c.fade_volume(1.0, 2.0);

    c.dispose();
    c.dispose();

    assert!(c.is_disposed());
    assert!(!c.paused());
    assert!(!c.looping());
    assert!((c.volume() - 1.0).abs() < f32::EPSILON);
    assert!(!c.is_fading());
    assert!(!c.is_reporting_progress());
    assert_eq!(c.next_deadline(), None);
    assert_eq!(state.borrow().count(&EngineCall::Release), 1);
}

#[tokio::test(start_paused = true)]
async fn test_commands_after_dispose_are_noops() {
    let (mut c, state, mut rx) = controller();
    c.dispose();
    let calls_before = state.borrow().calls.len();

    c.set_source(&SourceOptions::new("a").autoplay(true));
    c.play();
    c.set_volume(0.2);
    c.set_loop(true);
    c.pause();
    assert!(!c.seek(10.0));
    c.fade_volume(0.5, 1.0);
    c.handle_signal(EngineSignal::StateChanged(EngineState::Ready));

    assert_eq!(state.borrow().calls.len(), calls_before);
    assert!(!c.is_fading());
    assert!(drain(&mut rx).is_empty());

    // dispose 重置的状态保持不变
    assert!((c.volume() - 1.0).abs() < f32::EPSILON);
    assert!(!c.looping());
    assert!(!c.paused());
}

#[tokio::test(start_paused = true)]
async fn test_non_finite_volumes_are_ignored() {
    let (mut c, state, _rx) = controller();
    c.set_volume(0.4);
    let calls_before = state.borrow().calls.len();

    c.set_volume(f32::NAN);
    c.set_volume(f32::INFINITY);
    c.fade_volume(f32::NAN, 1.0);
    c.set_source(&SourceOptions::new("a").volume(f32::NAN));

    assert!(!c.is_fading());
    assert!((c.volume() - 0.4).abs() < f32::EPSILON);
    let calls = state.borrow().calls.clone();
    assert!(
        calls[calls_before..]
            .iter()
            .all(|call| !matches!(call, EngineCall::SetVolume(_)))
    );
}

#[tokio::test(start_paused = true)]
async fn test_set_source_autoplay_and_volume() {
    let (mut c, state, _rx) = controller();
    c.set_source(&SourceOptions::new("a").autoplay(true).volume(0.5));

    assert!(!c.paused());
    assert!((c.volume() - 0.5).abs() < f32::EPSILON);
    assert_eq!(
        state.borrow().calls,
        vec![
            EngineCall::Load("a".to_owned()),
            EngineCall::SetPlayWhenReady(true),
            EngineCall::SetVolume(0.5),
        ]
    );

    c.set_source(&SourceOptions::new("b"));
    assert!(c.paused());
    assert!(state.borrow().calls.ends_with(&[
        EngineCall::Load("b".to_owned()),
        EngineCall::SetPlayWhenReady(false),
    ]));
}

#[tokio::test(start_paused = true)]
async fn test_play_pause_update_intent() {
    let (mut c, state, _rx) = controller();
    c.pause();
    assert!(c.paused());
    c.play();
    c.play();
    assert!(!c.paused());
    assert_eq!(state.borrow().count(&EngineCall::Play), 2);
    assert_eq!(state.borrow().count(&EngineCall::Pause), 1);
}

#[tokio::test(start_paused = true)]
async fn test_seek_to_current_position_is_debounced() {
    let (mut c, state, mut rx) = controller();
    state.borrow_mut().position_ms = 12_000;

    assert!(!c.seek(12.0));
    assert!(state.borrow().seeks().is_empty());
    assert!(drain(&mut rx).is_empty());

    // 同一毫秒内的差异也视为相同位置
    assert!(!c.seek(12.0004));
    assert!(state.borrow().seeks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_seek_to_new_position_emits_one_seek() {
    let (mut c, state, mut rx) = controller();
    state.borrow_mut().position_ms = 3_000;

    assert!(c.seek(42.5));
    assert_eq!(state.borrow().seeks(), vec![42_500]);

    c.handle_signal(EngineSignal::PositionDiscontinuity {
        old_ms: 3_000,
        new_ms: 42_500,
    });
    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].payload, EventPayload::Seek { seek_time: 42.5 });

    // 再次 seek 到同一位置被拦下
    assert!(!c.seek(42.5));
    assert_eq!(state.borrow().seeks().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_negative_seek_targets_zero() {
    let (mut c, state, _rx) = controller();
    state.borrow_mut().position_ms = 0;
    assert!(!c.seek(-3.0));
    state.borrow_mut().position_ms = 500;
    assert!(c.seek(-3.0));
    assert_eq!(state.borrow().seeks(), vec![0]);
}

#[tokio::test(start_paused = true)]
async fn test_fade_up_converges_and_stops() {
    let (mut c, state, _rx) = controller();
    state.borrow_mut().volume = 0.0;

    c.fade_volume(1.0, 1.0);
    assert!(c.is_fading());

    // 初始停顿内不写音量
    advance(Duration::from_millis(999)).await;
    c.run_due(Instant::now());
    assert!(state.borrow().volume_writes().is_empty());

    run_for(&mut c, Duration::from_secs(3)).await;

    assert_eq!(state.borrow().volume_writes(), vec![1.0]);
    assert!((state.borrow().volume - 1.0).abs() < f32::EPSILON);
    assert!((c.volume() - 1.0).abs() < f32::EPSILON);
    assert!(!c.is_fading());
    assert_eq!(c.next_deadline(), None);
}

#[tokio::test(start_paused = true)]
async fn test_fade_up_ramps_quadratically() {
    let (mut c, state, _rx) = controller();
    state.borrow_mut().volume = 0.0;

    c.fade_volume(1.0, 2.0);
    run_for(&mut c, Duration::from_secs(4)).await;

    let writes = state.borrow().volume_writes();
    // 1.0s, 1.1s, ... 2.0s：t² 曲线，最后一次正好到目标
    assert_eq!(writes.len(), 11);
    assert!((writes[0] - 0.25).abs() < 1e-6);
    assert!(writes.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(writes.last().copied(), Some(1.0));
    assert!(!c.is_fading());
}

#[tokio::test(start_paused = true)]
async fn test_fade_down_anchors_to_initial_volume() {
    let (mut c, state, _rx) = controller();
    state.borrow_mut().volume = 0.8;

    c.fade_volume(0.0, 2.0);
    run_for(&mut c, Duration::from_secs(4)).await;

    let writes = state.borrow().volume_writes();
    assert!((writes[0] - 0.55).abs() < 1e-6);
    assert_eq!(writes.last().copied(), Some(0.0));
    assert!(c.volume().abs() < f32::EPSILON);
    assert!(!c.is_fading());
}

#[tokio::test(start_paused = true)]
async fn test_set_volume_cancels_fade() {
    let (mut c, state, _rx) = controller();
    state.borrow_mut().volume = 0.0;

    c.fade_volume(1.0, 4.0);
    advance(Duration::from_millis(1_200)).await;
    c.run_due(Instant::now());
    assert!(!state.borrow().volume_writes().is_empty());

    c.set_volume(0.3);
    assert!(!c.is_fading());
    let writes_after_cancel = state.borrow().volume_writes().len();

    run_for(&mut c, Duration::from_secs(5)).await;
    assert_eq!(state.borrow().volume_writes().len(), writes_after_cancel);
    assert!((state.borrow().volume - 0.3).abs() < f32::EPSILON);
    assert!((c.volume() - 0.3).abs() < f32::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn test_seek_cancels_fade_and_restores_volume() {
    let (mut c, state, _rx) = controller();
    c.set_volume(0.6);
    state.borrow_mut().position_ms = 1_000;

    c.fade_volume(0.0, 2.0);
    advance(Duration::from_millis(1_000)).await;
    c.run_due(Instant::now());
    assert!(state.borrow().volume < 0.6);

    assert!(c.seek(30.0));
    assert!(!c.is_fading());
    assert!((state.borrow().volume - 0.6).abs() < f32::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn test_debounced_seek_keeps_fade_running() {
    let (mut c, state, _rx) = controller();
    state.borrow_mut().position_ms = 5_000;
    c.fade_volume(0.0, 2.0);

    assert!(!c.seek(5.0));
    assert!(c.is_fading());
}

#[tokio::test(start_paused = true)]
async fn test_set_source_cancels_fade_without_restore() {
    let (mut c, state, _rx) = controller();
    c.set_volume(0.6);
    c.fade_volume(0.0, 2.0);
    advance(Duration::from_millis(1_000)).await;
    c.run_due(Instant::now());
    let faded = state.borrow().volume;

    c.set_source(&SourceOptions::new("next"));
    assert!(!c.is_fading());
    assert_eq!(state.borrow().volume, faded);
}

#[tokio::test(start_paused = true)]
async fn test_new_fade_replaces_old() {
    let (mut c, state, _rx) = controller();
    state.borrow_mut().volume = 0.5;

    c.fade_volume(1.0, 10.0);
    c.fade_volume(0.0, 1.0);
    run_for(&mut c, Duration::from_secs(3)).await;

    assert!(state.borrow().volume.abs() < f32::EPSILON);
    assert!(state.borrow().volume_writes().iter().all(|v| *v <= 0.5));
    assert!(!c.is_fading());
}

#[tokio::test(start_paused = true)]
async fn test_fade_with_non_positive_duration_is_noop() {
    let (mut c, _state, _rx) = controller();
    c.fade_volume(0.0, 0.0);
    c.fade_volume(0.0, -1.0);
    c.fade_volume(0.0, f64::NAN);
    assert!(!c.is_fading());
    assert_eq!(c.next_deadline(), None);
}

#[tokio::test(start_paused = true)]
async fn test_dispose_mid_fade_stops_ticks() {
    let (mut c, state, _rx) = controller();
    state.borrow_mut().volume = 0.0;
    c.fade_volume(1.0, 2.0);
    advance(Duration::from_millis(1_000)).await;
    c.run_due(Instant::now());
    c.dispose();

    let writes = state.borrow().volume_writes().len();
    run_for(&mut c, Duration::from_secs(3)).await;
    assert_eq!(state.borrow().volume_writes().len(), writes);
}

#[tokio::test(start_paused = true)]
async fn test_state_signals_map_to_events() {
    let (mut c, state, mut rx) = controller();
    state.borrow_mut().duration_ms = Some(90_500);
    state.borrow_mut().video_size = Some(VideoSize {
        width: 640,
        height: 360,
    });

    c.handle_signal(EngineSignal::StateChanged(EngineState::Buffering));
    assert_eq!(c.phase(), PlaybackPhase::Buffering);
    c.handle_signal(EngineSignal::StateChanged(EngineState::Ready));
    assert_eq!(c.phase(), PlaybackPhase::Ready);
    c.handle_signal(EngineSignal::StateChanged(EngineState::Idle));
    assert_eq!(c.phase(), PlaybackPhase::Idle);

    let events = drain(&mut rx);
    let kinds: Vec<_> = events.iter().map(PlayerEvent::kind).collect();
    assert_eq!(
        kinds,
        vec![EventKind::Buffering, EventKind::Load, EventKind::Stalled]
    );
    match &events[1].payload {
        EventPayload::Load {
            duration,
            current_time,
            video_size,
            ..
        } => {
            assert!((duration - 90.5).abs() < 1e-9);
            assert_eq!(*current_time, 0.0);
            assert_eq!(video_size.map(|v| v.width), Some(640));
        }
        other => panic!("unexpected payload {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_ended_with_loop_restarts_from_zero() {
    let (mut c, state, mut rx) = controller();
    c.set_loop(true);
    c.pause();
    state.borrow_mut().position_ms = 120_000;

    c.handle_signal(EngineSignal::StateChanged(EngineState::Ended));

    assert_eq!(c.phase(), PlaybackPhase::Ended);
    assert_eq!(kinds(&mut rx), vec![EventKind::End]);
    let calls = state.borrow().calls.clone();
    assert_eq!(
        &calls[calls.len() - 2..],
        &[EngineCall::SeekTo(0), EngineCall::Play]
    );
    assert!(!c.paused());
}

#[tokio::test(start_paused = true)]
async fn test_ended_without_loop_does_not_seek() {
    let (mut c, state, mut rx) = controller();
    c.handle_signal(EngineSignal::StateChanged(EngineState::Ended));

    assert_eq!(kinds(&mut rx), vec![EventKind::End]);
    assert!(state.borrow().seeks().is_empty());
    assert_eq!(state.borrow().count(&EngineCall::Play), 0);
}

#[tokio::test(start_paused = true)]
async fn test_zero_position_discontinuity_is_suppressed() {
    let (mut c, _state, mut rx) = controller();
    c.handle_signal(EngineSignal::PositionDiscontinuity {
        old_ms: 0,
        new_ms: 0,
    });
    c.handle_signal(EngineSignal::PositionDiscontinuity {
        old_ms: -1,
        new_ms: 0,
    });
    assert!(drain(&mut rx).is_empty());

    // 从别处回到 0 是真正的 seek
    c.handle_signal(EngineSignal::PositionDiscontinuity {
        old_ms: 8_000,
        new_ms: 0,
    });
    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].payload, EventPayload::Seek { seek_time: 0.0 });
}

#[tokio::test(start_paused = true)]
async fn test_engine_error_becomes_event() {
    let (mut c, _state, mut rx) = controller();
    c.handle_signal(EngineSignal::Error(EngineError::new(
        code::DECODE_FAILED,
        "corrupt",
    )));
    let events = drain(&mut rx);
    assert_eq!(
        events[0].payload,
        EventPayload::Error {
            error_code: code::DECODE_FAILED,
            error_message: "corrupt".to_owned(),
        }
    );
    assert!(!c.is_disposed());
}

#[tokio::test(start_paused = true)]
async fn test_progress_reports_while_playing() {
    let (mut c, state, mut rx) = controller();
    state.borrow_mut().playing = true;
    state.borrow_mut().position_ms = 1_500;

    c.handle_signal(EngineSignal::IsPlayingChanged(true));
    assert!(c.is_reporting_progress());
    assert_eq!(kinds(&mut rx), vec![EventKind::Play]);

    // 立即一次，然后每 500ms 一次
    run_for(&mut c, Duration::from_millis(1_000)).await;
    let events = drain(&mut rx);
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|e| e.kind() == EventKind::Progress));
    assert_eq!(
        events[0].payload,
        EventPayload::Progress {
            current_time: 1.5,
            duration: 120.0
        }
    );

    state.borrow_mut().playing = false;
    c.handle_signal(EngineSignal::IsPlayingChanged(false));
    assert_eq!(kinds(&mut rx), vec![EventKind::Pause]);
    assert!(!c.is_reporting_progress());
    run_for(&mut c, Duration::from_secs(2)).await;
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_progress_stops_when_engine_stops_playing() {
    let (mut c, state, mut rx) = controller();
    state.borrow_mut().playing = true;
    c.handle_signal(EngineSignal::IsPlayingChanged(true));
    c.run_due(Instant::now());
    drain(&mut rx);

    // 引擎已停但回调还没到：下一次 tick 自行退出
    state.borrow_mut().playing = false;
    run_for(&mut c, Duration::from_secs(1)).await;
    assert!(drain(&mut rx).is_empty());
    assert!(!c.is_reporting_progress());
}

#[tokio::test(start_paused = true)]
async fn test_repeated_is_playing_signal_is_not_a_flip() {
    let (mut c, state, mut rx) = controller();
    state.borrow_mut().playing = true;
    c.handle_signal(EngineSignal::IsPlayingChanged(true));
    c.handle_signal(EngineSignal::IsPlayingChanged(true));
    c.handle_signal(EngineSignal::IsPlayingChanged(false));
    c.handle_signal(EngineSignal::IsPlayingChanged(false));
    assert_eq!(kinds(&mut rx), vec![EventKind::Play, EventKind::Pause]);
}

#[tokio::test(start_paused = true)]
async fn test_autoplay_scenario_event_order() {
    let (mut c, state, mut rx) = controller();
    c.set_source(&SourceOptions::new("a").autoplay(true).volume(0.5));

    c.handle_signal(EngineSignal::StateChanged(EngineState::Buffering));
    c.handle_signal(EngineSignal::StateChanged(EngineState::Ready));
    c.run_due(Instant::now());
    state.borrow_mut().playing = true;
    c.handle_signal(EngineSignal::IsPlayingChanged(true));
    run_for(&mut c, Duration::from_millis(600)).await;

    let kinds = kinds(&mut rx);
    let load = kinds.iter().position(|k| *k == EventKind::Load);
    let play = kinds.iter().position(|k| *k == EventKind::Play);
    let first_progress = kinds.iter().position(|k| *k == EventKind::Progress);
    assert!(load < play);
    assert!(play < first_progress);
    assert!(first_progress.is_some());
}
