//! Test helpers for jukebox-player integration tests
//!
//! - MockPlayer: scripted [`Player`](jukebox_player::playback::Player) that
//!   records every call
//! - SharedBuffer: in-memory writer for heartbeat assertions
//! - input files and shell-script children for the watchdog

#![allow(dead_code)]

pub mod fixtures;
pub mod mock_player;

pub use fixtures::{input_file, set_input, sh_child, SharedBuffer};
pub use mock_player::{MockPlayer, PlayerCall};
