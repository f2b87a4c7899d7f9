//! Player capability consumed by the playback controller
//!
//! The controller never talks to an audio device directly. It drives any
//! type implementing [`Player`]; the production implementation is
//! [`AudioPlayer`](crate::audio::AudioPlayer).

use crate::error::Result;
use std::fmt;
use std::path::{Path, PathBuf};

/// Reference to one playable track
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackRef(PathBuf);

impl TrackRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl From<PathBuf> for TrackRef {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl From<&str> for TrackRef {
    fn from(path: &str) -> Self {
        Self(PathBuf::from(path))
    }
}

impl fmt::Display for TrackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Events reported by a player
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    /// The loaded track played to its end
    EndOfStream,

    /// Playback of the loaded track failed
    Error {
        error: String,
        detail: Option<String>,
    },
}

/// Media player capability
///
/// Every method must return promptly: the event loop calls them from its
/// single thread between two bounded waits.
pub trait Player {
    /// Make `track` the current track, replacing whatever was loaded
    fn load(&mut self, track: &TrackRef) -> Result<()>;

    /// Start or resume output of the loaded track
    fn play(&mut self) -> Result<()>;

    /// Suspend output, keeping the position
    fn pause(&mut self) -> Result<()>;

    /// Halt output; a later `play` restarts the loaded track from the beginning
    fn stop(&mut self) -> Result<()>;

    /// Next pending event, without waiting
    fn poll_event(&mut self) -> Option<PlayerEvent>;
}
