//! Playback state machine and playlist

pub mod controller;
pub mod player;
pub mod playlist;
pub mod state;

pub use controller::PlaybackController;
pub use player::{Player, PlayerEvent, TrackRef};
pub use playlist::Playlist;
pub use state::PlaybackState;
