//! Error types for msgplay

use std::io;
use thiserror::Error;

/// Result type for msgplay operations
pub type Result<T> = std::result::Result<T, PlaybackError>;

/// Errors that can occur in msgplay
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Message envelope or content does not match its declared type
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Recording file not found
    #[error("Recording file not found: {0}")]
    FileNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Publishing a reply did not complete in time
    #[error("Emitting {msg_type} reply timed out after {timeout_ms} ms")]
    EmitTimeout {
        /// Type of the reply being emitted
        msg_type: String,
        /// Bound that was exceeded
        timeout_ms: u64,
    },

    /// Observation channel was closed
    #[error("Channel closed")]
    ChannelClosed,

    /// Engine constructed outside a tokio runtime
    #[error("No tokio runtime available to run the playback loop")]
    NoRuntime,

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}
