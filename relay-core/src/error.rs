//! Crate-wide error types.

use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Crate-wide error type.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    #[error("failed to spawn transcoder: {0}")]
    Spawn(String),
}

impl RelayError {
    pub fn not_found(channel_id: impl Into<String>) -> Self {
        Self::ChannelNotFound(channel_id.into())
    }

    pub fn spawn(msg: impl Into<String>) -> Self {
        Self::Spawn(msg.into())
    }
}
