//! Error types for protocol encoding and validation.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while validating or (de)serializing wire messages.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// A value violates a domain rule (range, required field, format).
    #[error("validation error: {0}")]
    Validation(String),

    /// A body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// A body could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),

    /// No store operation matches the method and path.
    #[error("unknown route: {method} {path}")]
    UnknownRoute {
        /// HTTP method.
        method: String,
        /// Request path.
        path: String,
    },
}

impl ProtocolError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Returns true if the error was caused by the request content.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ProtocolError::Encode(_))
    }
}
