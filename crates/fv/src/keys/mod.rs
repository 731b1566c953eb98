//! Key material for the FV scheme.

mod evaluation_keys;
mod galois_keys;
mod public_key;
mod secret_key;

pub use evaluation_keys::EvaluationKeys;
pub use galois_keys::GaloisKeys;
pub use public_key::PublicKey;
pub use secret_key::SecretKey;
