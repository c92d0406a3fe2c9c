//! CLI command implementations.

pub mod analyze;
pub mod simulate;

use thiserror::Error;

/// Errors raised while turning arguments into work.
#[derive(Debug, Error)]
pub enum CliError {
    /// A required option was neither given nor set in the config file.
    #[error("--{0} is required unless --config provides it")]
    MissingOption(&'static str),

    /// An option value could not be used.
    #[error("invalid --{option}: {message}")]
    InvalidOption {
        /// Option name.
        option: &'static str,
        /// What was wrong.
        message: String,
    },
}
