//! Error type for the math crate.

use thiserror::Error;

/// The errors produced by the math layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// An operand is well formed but violates a declared invariant.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested operation is not available in this configuration.
    #[error("logic error: {0}")]
    LogicError(String),

    /// An index or count exceeds its allowed range.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// A coprimality requirement inside a Euclidean routine failed.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A byte stream could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Shorthand for an [`Error::InvalidArgument`].
    pub fn invalid(msg: &str) -> Self {
        Self::InvalidArgument(msg.to_string())
    }
}

/// Result type of the math crate.
pub type Result<T> = std::result::Result<T, Error>;
