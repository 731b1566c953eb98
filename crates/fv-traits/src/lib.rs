#![warn(missing_docs, unused_imports)]

//! Traits shared by the fv crates.

use std::sync::Arc;

use rand::{CryptoRng, RngCore};

/// Object-safe bound for the random byte generators handed out by a
/// [`RandomGeneratorFactory`].
pub trait RandomGenerator: RngCore + CryptoRng + Send {}

impl<T: RngCore + CryptoRng + Send> RandomGenerator for T {}

/// Factory producing independent random byte generators.
///
/// Samplers take their bytes from a generator created by a factory so that
/// tests can inject deterministic streams.
pub trait RandomGeneratorFactory: Send + Sync {
    /// Create a fresh generator.
    fn create(&self) -> Box<dyn RandomGenerator>;
}

/// Serialize a value into its canonical little-endian byte layout.
pub trait Serialize {
    /// Serialize `self` into a vector of bytes.
    fn to_bytes(&self) -> Vec<u8>;
}

/// Deserialize a self-contained value from bytes.
pub trait Deserialize: Sized {
    /// The error type when deserialization fails.
    type Error;

    /// Attempt to deserialize a value from `bytes`.
    fn from_bytes(bytes: &[u8]) -> Result<Self, Self::Error>;
}

/// Deserialize a value that only makes sense relative to a set of
/// parameters (a ciphertext, a key).
pub trait DeserializeUsingParameters: Sized {
    /// The error type when deserialization fails.
    type Error;

    /// The parameters needed to interpret the bytes.
    type Parameters;

    /// Attempt to deserialize a value from `bytes` under `params`.
    fn from_bytes(bytes: &[u8], params: &Arc<Self::Parameters>) -> Result<Self, Self::Error>;
}
