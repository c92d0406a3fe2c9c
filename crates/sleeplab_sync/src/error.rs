//! Error types for the sync coordinator.

use sleeplab_protocol::{from_json, ErrorBody, ErrorKind, ProtocolError};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Protocol error (unexpected or undecodable body).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A value was rejected locally or by the store.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The request tried to change a write-once field.
    #[error("immutable field: {0}")]
    ImmutableField(String),

    /// The store has nothing for the request.
    #[error("not found: {0}")]
    NotFound(String),

    /// The store failed internally.
    #[error("server error: {0}")]
    ServerError(String),

    /// Invalid state transition.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },

    /// Not connected.
    #[error("not connected to server")]
    NotConnected,

    /// The monitoring station has no room selected.
    #[error("no room selected")]
    NoRoomSelected,

    /// No failed upload is waiting for a manual retry.
    #[error("no failed upload to retry")]
    NothingToRetry,

    /// Unexpected failure inside the coordinator.
    #[error("internal error: {0}")]
    Internal(String),

    /// The dispatcher has stopped.
    #[error("sync service has shut down")]
    Shutdown,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::ServerError(_) => true,
            _ => false,
        }
    }

    /// Returns true if the store or local validation rejected the request.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            SyncError::Validation(_) | SyncError::ImmutableField(_) | SyncError::NotFound(_)
        )
    }

    /// Builds an error from a non-2xx store response.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        match from_json::<ErrorBody>(body) {
            Ok(ErrorBody { error, kind }) => match kind {
                ErrorKind::Validation => SyncError::Validation(error),
                ErrorKind::ImmutableField => SyncError::ImmutableField(error),
                ErrorKind::NotFound => SyncError::NotFound(error),
                ErrorKind::Internal => SyncError::ServerError(error),
            },
            Err(_) if status >= 500 => SyncError::ServerError(format!("status {}", status)),
            Err(_) => SyncError::Protocol(format!("unexpected status {}", status)),
        }
    }
}

impl From<ProtocolError> for SyncError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Validation(msg) => SyncError::Validation(msg),
            other => SyncError::Protocol(other.to_string()),
        }
    }
}
