//! Error types for ClipPlayer
//!
//! This module defines custom error types used throughout the engine.
//! We use thiserror for convenient error type definitions and anyhow for
//! application-level error handling in the binary.

use thiserror::Error;

/// Main error type for ClipPlayer
#[derive(Error, Debug)]
pub enum ClipPlayerError {
    /// Decoder errors
    #[error("Decoder error: {0}")]
    Decoder(String),

    /// Audio output errors
    #[error("Audio error: {0}")]
    Audio(String),

    /// Time-stretcher errors
    #[error("Stretcher error: {0}")]
    Stretcher(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File error: {0}")]
    FileIO(#[from] std::io::Error),

    /// Invalid input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation not valid in the current playback state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Synchronization error
    #[error("Synchronization error: {0}")]
    Sync(String),

    /// Generic error for unexpected situations
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClipPlayerError {
    /// Create a decoder error from string
    pub fn decoder_error<S: Into<String>>(msg: S) -> Self {
        ClipPlayerError::Decoder(msg.into())
    }

    /// Create an audio error from string
    pub fn audio_error<S: Into<String>>(msg: S) -> Self {
        ClipPlayerError::Audio(msg.into())
    }
}

/// Convenience type alias for Results in ClipPlayer
pub type Result<T> = std::result::Result<T, ClipPlayerError>;

/// Extension trait for converting other errors to ClipPlayerError
pub trait IntoPlayerError<T> {
    /// Convert this error into a ClipPlayerError with the given context
    fn decoder_err(self, context: &str) -> Result<T>;
    fn audio_err(self, context: &str) -> Result<T>;
    fn stretcher_err(self, context: &str) -> Result<T>;
    fn config_err(self, context: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> IntoPlayerError<T> for std::result::Result<T, E> {
    fn decoder_err(self, context: &str) -> Result<T> {
        self.map_err(|e| ClipPlayerError::Decoder(format!("{}: {}", context, e)))
    }

    fn audio_err(self, context: &str) -> Result<T> {
        self.map_err(|e| ClipPlayerError::Audio(format!("{}: {}", context, e)))
    }

    fn stretcher_err(self, context: &str) -> Result<T> {
        self.map_err(|e| ClipPlayerError::Stretcher(format!("{}: {}", context, e)))
    }

    fn config_err(self, context: &str) -> Result<T> {
        self.map_err(|e| ClipPlayerError::Config(format!("{}: {}", context, e)))
    }
}
