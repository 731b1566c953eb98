#![warn(missing_docs, unused_imports)]

//! Utilities for the fv library.

mod sampler;

pub use sampler::ClippedNormal;

use std::panic::UnwindSafe;
use std::sync::{Arc, OnceLock};

use fv_traits::{RandomGenerator, RandomGeneratorFactory};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Factory backed by `ChaCha8Rng`, optionally seeded for determinism.
#[derive(Debug, Clone)]
pub struct ChaChaRandomGeneratorFactory {
    seed: Option<<ChaCha8Rng as SeedableRng>::Seed>,
}

impl ChaChaRandomGeneratorFactory {
    /// A factory whose generators are seeded from the operating system.
    pub fn new() -> Self {
        Self { seed: None }
    }

    /// A factory whose generators all start from the given seed.
    pub fn from_seed(seed: <ChaCha8Rng as SeedableRng>::Seed) -> Self {
        Self { seed: Some(seed) }
    }
}

impl Default for ChaChaRandomGeneratorFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomGeneratorFactory for ChaChaRandomGeneratorFactory {
    fn create(&self) -> Box<dyn RandomGenerator> {
        match self.seed {
            Some(seed) => Box::new(ChaCha8Rng::from_seed(seed)),
            None => Box::new(ChaCha8Rng::from_entropy()),
        }
    }
}

/// Returns the process-wide default random generator factory.
///
/// Initialized on first use; parameters may carry their own factory instead.
pub fn default_random_generator_factory() -> Arc<dyn RandomGeneratorFactory> {
    static DEFAULT: OnceLock<Arc<ChaChaRandomGeneratorFactory>> = OnceLock::new();
    DEFAULT
        .get_or_init(|| Arc::new(ChaChaRandomGeneratorFactory::new()))
        .clone()
}

/// Define catch_unwind to silence the panic.
pub fn catch_unwind<F, R>(f: F) -> std::thread::Result<R>
where
    F: FnOnce() -> R + UnwindSafe,
{
    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(|_| {}));
    let r = std::panic::catch_unwind(f);
    std::panic::set_hook(prev_hook);
    r
}

/// Returns whether the modulus p is prime; this function is 100% accurate.
pub fn is_prime(p: u64) -> bool {
    num_bigint_dig::prime::probably_prime(&num_bigint_dig::BigUint::from(p), 0)
}

/// Probabilistic primality of a little-endian byte-encoded integer.
pub fn is_prime_bytes_le(bytes: &[u8]) -> bool {
    num_bigint_dig::prime::probably_prime(&num_bigint_dig::BigUint::from_bytes_le(bytes), 20)
}

/// Unsigned 64-bit integer division rounding up.
pub const fn div_ceil(a: usize, b: usize) -> usize {
    debug_assert!(b != 0);
    (a + b - 1) / b
}

/// Transmute a f64 into the u64 with the same bit pattern.
///
/// Used when hashing floating-point configuration values.
pub fn f64_to_bits(x: f64) -> u64 {
    x.to_bits()
}
