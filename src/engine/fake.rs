//! 测试用引擎：记录每次调用，状态由测试直接改写

use std::cell::RefCell;
use std::rc::Rc;

use super::{EngineState, MediaEngine};
use crate::events::VideoSize;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EngineCall {
    Load(String),
    SetPlayWhenReady(bool),
    Play,
    Pause,
    SeekTo(u64),
    SetVolume(f32),
    Release,
}

#[derive(Debug)]
pub(crate) struct FakeState {
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
    pub volume: f32,
    pub playing: bool,
    pub state: EngineState,
    pub video_size: Option<VideoSize>,
    pub calls: Vec<EngineCall>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            position_ms: 0,
            duration_ms: Some(120_000),
            volume: 1.0,
            playing: false,
            state: EngineState::Idle,
            video_size: None,
            calls: Vec::new(),
        }
    }
}

impl FakeState {
    pub fn volume_writes(&self) -> Vec<f32> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                EngineCall::SetVolume(v) => Some(*v),
                _ => None,
            })
            .collect()
    }

    pub fn seeks(&self) -> Vec<u64> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                EngineCall::SeekTo(ms) => Some(*ms),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &EngineCall) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }
}

pub(crate) struct FakeEngine {
    state: Rc<RefCell<FakeState>>,
}

impl FakeEngine {
    pub fn new() -> (Self, Rc<RefCell<FakeState>>) {
        let state = Rc::new(RefCell::new(FakeState::default()));
        (
            Self {
                state: Rc::clone(&state),
            },
            state,
        )
    }
}

impl MediaEngine for FakeEngine {
    fn load(&mut self, uri: &str) {
        self.state.borrow_mut().calls.push(EngineCall::Load(uri.to_owned()));
    }

    fn set_play_when_ready(&mut self, play_when_ready: bool) {
        self.state
            .borrow_mut()
            .calls
            .push(EngineCall::SetPlayWhenReady(play_when_ready));
    }

    fn play(&mut self) {
        self.state.borrow_mut().calls.push(EngineCall::Play);
    }

    fn pause(&mut self) {
        self.state.borrow_mut().calls.push(EngineCall::Pause);
    }

    fn seek_to(&mut self, position_ms: u64) {
        let mut s = self.state.borrow_mut();
        s.position_ms = position_ms;
        s.calls.push(EngineCall::SeekTo(position_ms));
    }

    fn set_volume(&mut self, volume: f32) {
        let mut s = self.state.borrow_mut();
        s.volume = volume;
        s.calls.push(EngineCall::SetVolume(volume));
    }

    fn volume(&self) -> f32 {
        self.state.borrow().volume
    }

    fn current_position_ms(&self) -> u64 {
        self.state.borrow().position_ms
    }

    fn duration_ms(&self) -> Option<u64> {
        self.state.borrow().duration_ms
    }

    fn is_playing(&self) -> bool {
        self.state.borrow().playing
    }

    fn state(&self) -> EngineState {
        self.state.borrow().state
    }

    fn video_size(&self) -> Option<VideoSize> {
        self.state.borrow().video_size
    }

    fn release(&mut self) {
        self.state.borrow_mut().calls.push(EngineCall::Release);
    }
}
