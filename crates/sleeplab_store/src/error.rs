//! Error types for the store.

use sleeplab_protocol::{ErrorBody, ErrorKind, ProtocolError};
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The request is malformed or a value is out of range.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The request tried to change a write-once field.
    #[error("field '{field}' cannot be changed: {message}")]
    ImmutableField {
        /// Name of the field.
        field: &'static str,
        /// Details.
        message: String,
    },

    /// No patient, result or image matches the request.
    #[error("not found: {0}")]
    NotFound(String),

    /// The store is in an inconsistent state.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Error category carried in the response body.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Validation(_) => ErrorKind::Validation,
            StoreError::ImmutableField { .. } => ErrorKind::ImmutableField,
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        matches!(self, StoreError::Internal(_))
    }

    /// Response body describing this error.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody::new(self.kind(), self.to_string())
    }
}

impl From<ProtocolError> for StoreError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Validation(msg) | ProtocolError::Decode(msg) => {
                StoreError::Validation(msg)
            }
            ProtocolError::UnknownRoute { method, path } => {
                StoreError::NotFound(format!("no route for {} {}", method, path))
            }
            ProtocolError::Encode(msg) => StoreError::Internal(msg),
        }
    }
}
