//! Sync error types.

use thiserror::Error;

use super::protocol::WireKey;
use super::state::Role;

/// Errors returned by [`SyncChannel`](super::SyncChannel) operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The channel has no established session
    #[error("Channel is not connected")]
    NotConnected,

    /// The transport reported a hard failure and the retry policy is exhausted
    #[error("Transport failure (code {0})")]
    TransportFailure(i32),

    /// The session already acts in the other role
    #[error("Channel is already acting as {0}")]
    RoleConflict(Role),

    /// The channel was closed and cannot be reused
    #[error("Channel is closed")]
    Closed,
}

/// Errors decoding a wire map into a [`SyncRecord`](crate::SyncRecord).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Missing field: {0}")]
    MissingField(WireKey),

    #[error("Type mismatch for field: {0}")]
    TypeMismatch(WireKey),
}

/// Failure reported by a transport for a connect attempt or a put.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Transport error {code}: {message}")]
pub struct TransportError {
    pub code: i32,
    pub message: String,
}

impl TransportError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<TransportError> for ChannelError {
    fn from(e: TransportError) -> Self {
        ChannelError::TransportFailure(e.code)
    }
}
