//! Error type of the fv crate.

use thiserror::Error;

/// The errors produced by the scheme layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// An operand is well formed but violates a declared invariant.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The parameters forbid the requested path.
    #[error("logic error: {0}")]
    LogicError(String),

    /// An index or a plaintext coefficient count exceeds the polynomial
    /// modulus degree.
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
    pub(crate) fn invalid(msg: &str) -> Self {
        Self::InvalidArgument(msg.to_string())
    }

    pub(crate) fn logic(msg: &str) -> Self {
        Self::LogicError(msg.to_string())
    }
}

impl From<fv_math::Error> for Error {
    fn from(e: fv_math::Error) -> Self {
        match e {
            fv_math::Error::InvalidArgument(m) => Self::InvalidArgument(m),
            fv_math::Error::LogicError(m) => Self::LogicError(m),
            fv_math::Error::OutOfRange(m) => Self::OutOfRange(m),
            fv_math::Error::InvariantViolation(m) => Self::InvariantViolation(m),
            fv_math::Error::Serialization(m) => Self::Serialization(m),
        }
    }
}

/// Result type of the fv crate.
pub type Result<T> = std::result::Result<T, Error>;
