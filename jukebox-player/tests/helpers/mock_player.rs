//! Scripted player for controller and event loop tests

use jukebox_player::playback::{Player, PlayerEvent, TrackRef};
use jukebox_player::{Error, Result};
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCall {
    Load(TrackRef),
    Play,
    Pause,
    Stop,
}

#[derive(Debug, Default)]
pub struct MockPlayer {
    calls: Vec<PlayerCall>,
    events: VecDeque<PlayerEvent>,
    failing_loads: HashSet<TrackRef>,
    fail_play: bool,
}

impl MockPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call so far, oldest first
    pub fn calls(&self) -> &[PlayerCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Tracks passed to `load`, in order
    pub fn loaded_tracks(&self) -> Vec<TrackRef> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                PlayerCall::Load(track) => Some(track.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &PlayerCall) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    /// Queue an event for the next `poll_event`
    pub fn push_event(&mut self, event: PlayerEvent) {
        self.events.push_back(event);
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Make `load` fail for `track`
    pub fn fail_load_of(&mut self, track: impl Into<TrackRef>) {
        self.failing_loads.insert(track.into());
    }

    pub fn set_fail_play(&mut self, fail: bool) {
        self.fail_play = fail;
    }
}

impl Player for MockPlayer {
    fn load(&mut self, track: &TrackRef) -> Result<()> {
        self.calls.push(PlayerCall::Load(track.clone()));
        if self.failing_loads.contains(track) {
            return Err(Error::Decode(format!("cannot decode {}", track)));
        }
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.calls.push(PlayerCall::Play);
        if self.fail_play {
            return Err(Error::AudioOutput("no device".to_string()));
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.calls.push(PlayerCall::Pause);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.calls.push(PlayerCall::Stop);
        Ok(())
    }

    fn poll_event(&mut self) -> Option<PlayerEvent> {
        self.events.pop_front()
    }
}
