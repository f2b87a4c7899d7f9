//! Error types for jukebox-player
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for jukebox-player
#[derive(Error, Debug)]
pub enum Error {
    /// Startup configuration that cannot produce a working player
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Player command rejected (nothing loaded, session gone, ...)
    #[error("Playback error: {0}")]
    Player(String),

    /// Child process supervision errors
    #[error("Supervisor error: {0}")]
    Supervisor(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using jukebox-player Error
pub type Result<T> = std::result::Result<T, Error>;
