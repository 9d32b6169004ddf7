//! Common error types for the organizer crates

use thiserror::Error;

/// Common result type for organizer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the organizer crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML document could not be decoded
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input (desired-set documents, filters)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
