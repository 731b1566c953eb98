#![warn(missing_docs, unused_imports)]

//! Arithmetic engine for the fv library: multi-limb unsigned integers,
//! modular scalar arithmetic with shape-aware reduction, polynomials over
//! R_q = Z_q[x]/(x^n + 1), a negacyclic number-theoretic transform, a
//! Nussbaumer convolution over wide integers, and a two-modulus CRT
//! composer.

mod errors;

pub mod crt;
pub mod ntt;
pub mod nussbaumer;
pub mod rq;
pub mod serialize;
pub mod uint;
pub mod zq;

pub use errors::{Error, Result};
