//! # Jukebox Player Library
//!
//! Headless playlist player controlled by Unix signals and one hardware
//! input line, supervised by a watchdog process.
//!
//! **Architecture:** a parent watchdog re-executes the binary as a child
//! that runs the [`EventLoop`]. The child writes a heartbeat line to its
//! stdout on every tick; the watchdog kills and restarts it when the
//! heartbeats stop.
//!
//! Unix only: control goes through POSIX signals and GPIO-style sysfs files.

pub mod audio;
pub mod control;
pub mod error;
pub mod event_loop;
pub mod playback;
pub mod supervisor;

pub use error::{Error, Result};
pub use event_loop::{install_player_signals, EventLoop};
