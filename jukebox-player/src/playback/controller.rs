//! Playback controller: the Stopped/Playing/Paused state machine
//!
//! Translates commands (from signals, hardware input or player events) into
//! [`Player`] calls. Player failures never escape the controller: they are
//! logged and force the Stopped state, so one bad file cannot take the
//! process down.

use crate::control::input::InputLevel;
use crate::error::Error;
use crate::playback::player::{Player, PlayerEvent, TrackRef};
use crate::playback::playlist::Playlist;
use crate::playback::state::PlaybackState;
use tracing::{debug, error, info, warn};

pub struct PlaybackController<P: Player> {
    player: P,
    playlist: Playlist,
    state: PlaybackState,
    /// Whether the player currently holds the playlist's current track
    loaded: bool,
}

impl<P: Player> PlaybackController<P> {
    /// Create a stopped controller; nothing is loaded until the first `play`
    pub fn new(player: P, playlist: Playlist) -> Self {
        Self {
            player,
            playlist,
            state: PlaybackState::Stopped,
            loaded: false,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_track(&self) -> &TrackRef {
        self.playlist.current()
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut P {
        &mut self.player
    }

    /// Start playback of the current track
    ///
    /// Loads the track first if the player does not hold it yet. Does nothing
    /// when already playing.
    pub fn play(&mut self) {
        if self.state == PlaybackState::Playing {
            debug!("Already playing {}", self.playlist.current());
            return;
        }

        if !self.loaded {
            if let Err(e) = self.load_current() {
                self.fail("load", e);
                return;
            }
        }

        match self.player.play() {
            Ok(()) => {
                self.state = PlaybackState::Playing;
                info!("Playing {}", self.playlist.current());
            }
            Err(e) => self.fail("play", e),
        }
    }

    /// Pause playback; no-op unless playing
    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            debug!("Pause ignored while {}", self.state);
            return;
        }

        match self.player.pause() {
            Ok(()) => {
                self.state = PlaybackState::Paused;
                info!("Playback paused");
            }
            Err(e) => self.fail("pause", e),
        }
    }

    pub fn toggle(&mut self) {
        match self.state.toggled() {
            PlaybackState::Paused => self.pause(),
            _ => self.play(),
        }
    }

    /// Advance to the next track, keeping the current state
    ///
    /// While playing the new track starts immediately; while paused or
    /// stopped it is only loaded.
    pub fn next(&mut self) {
        self.playlist.advance();
        info!("Next track: {}", self.playlist.current());

        if let Err(e) = self.load_current() {
            self.fail("load", e);
            return;
        }

        if self.state == PlaybackState::Playing {
            match self.player.play() {
                Ok(()) => info!("Playing {}", self.playlist.current()),
                Err(e) => self.fail("play", e),
            }
        }
    }

    /// Halt the player and enter the Stopped state
    pub fn stop(&mut self) {
        if let Err(e) = self.player.stop() {
            warn!("Player stop failed: {}", e);
        }
        self.state = PlaybackState::Stopped;
        info!("Playback stopped");
    }

    /// React to an event reported by the player
    pub fn on_player_event(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::EndOfStream => {
                debug!("End of stream: {}", self.playlist.current());
                if let Err(e) = self.player.stop() {
                    warn!("Player stop failed: {}", e);
                }
                self.state = PlaybackState::Stopped;
                self.next();
                self.play();
            }
            PlayerEvent::Error { error, detail } => {
                error!("Player error on {}: {}", self.playlist.current(), error);
                if let Some(detail) = detail {
                    debug!("Player error detail: {}", detail);
                }
                self.stop();
            }
        }
    }

    /// Map a hardware input level to play/pause
    pub fn apply_input(&mut self, level: InputLevel) {
        debug!("Hardware input: {:?}", level);
        match level {
            InputLevel::Active => self.play(),
            InputLevel::Inactive => self.pause(),
        }
    }

    fn load_current(&mut self) -> crate::Result<()> {
        self.loaded = false;
        self.player.load(self.playlist.current())?;
        self.loaded = true;
        Ok(())
    }

    fn fail(&mut self, operation: &str, err: Error) {
        error!("Player {} failed for {}: {}", operation, self.playlist.current(), err);
        self.stop();
    }
}
