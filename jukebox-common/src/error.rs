//! Common error types for jukebox

use thiserror::Error;

/// Common result type for jukebox operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the jukebox crates
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading or parsing error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration value outside its accepted range
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
