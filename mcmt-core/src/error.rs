//! Error types for mcmt

use thiserror::Error;

/// Main error type for mcmt operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Length mismatch for {what}: expected {expected}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    /// A lookup that must always succeed did not (e.g. a sign pattern missing
    /// from the case table). Indicates a bug, never bad input.
    #[error("Internal consistency failure: {0}")]
    Inconsistent(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// Shorthand for [`Error::LengthMismatch`]
    pub fn length_mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        Error::LengthMismatch {
            what,
            expected,
            actual,
        }
    }
}

/// Result type alias for mcmt operations
pub type Result<T> = std::result::Result<T, Error>;
