//! Error types for lull-mixer
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for lull-mixer
#[derive(Error, Debug)]
pub enum Error {
    /// Admission denied by the mix limit (no state was changed)
    #[error("Mix limit reached: {active} of {limit} sounds already active")]
    ResourceExhaustion { limit: usize, active: usize },

    /// A unit's renderer failed; the unit has been torn down
    #[error("Backend failure for '{sound_id}': {message}")]
    Backend { sound_id: String, message: String },

    /// Premium-only sound requested on the Free tier
    #[error("Premium subscription required for sound '{0}'")]
    PremiumRequired(String),

    /// Volume that cannot be clamped into range (NaN or infinite)
    #[error("Invalid volume: {0}")]
    InvalidVolume(f32),

    /// The registry task is no longer running
    #[error("Mixer engine has shut down")]
    EngineClosed,

    /// Configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Errors from the shared library
    #[error(transparent)]
    Common(#[from] lull_common::Error),
}

/// Convenience Result type using lull-mixer Error
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a renderer handle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
