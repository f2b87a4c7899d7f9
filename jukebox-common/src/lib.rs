//! # jukebox common library
//!
//! Shared code for the jukebox crates:
//! - Error types
//! - Bootstrap configuration loading (TOML + CLI overrides)

pub mod config;
pub mod error;

pub use config::{ConfigOverrides, LoggingConfig, TomlConfig};
pub use error::{Error, Result};
