//! Error types for flow analysis.

use thiserror::Error;

/// Result type for analysis operations.
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Errors that can occur while analyzing a flow recording.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// A line of the input could not be used.
    #[error("malformed input at line {line}: {message}")]
    MalformedInput {
        /// 1-based line number.
        line: usize,
        /// What was wrong with the line.
        message: String,
    },

    /// The input holds no samples.
    #[error("malformed input: no flow samples found")]
    EmptyInput,

    /// The analysis configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The waveform could not be encoded.
    #[error("render error: {0}")]
    Render(String),

    /// The input file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalysisError {
    /// Creates a malformed-input error for a 1-based line number.
    pub fn malformed(line: usize, message: impl Into<String>) -> Self {
        Self::MalformedInput {
            line,
            message: message.into(),
        }
    }

    /// Returns true if the input file itself was rejected.
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            AnalysisError::MalformedInput { .. } | AnalysisError::EmptyInput
        )
    }
}
