//! Integer encoding into plaintext polynomials.

use fv_math::rq::BigPoly;
use fv_math::uint::BigUInt;

use crate::{Error, Result};

/// Encodes integers as base-2 plaintext polynomials and decodes them back
/// by evaluating at 2 with centered coefficients.
///
/// Freshly encoded polynomials have coefficients in {0, 1}; after
/// homomorphic arithmetic the coefficients grow, and decoding interprets
/// any coefficient in the upper half of [0, t) as negative.
#[derive(Debug, Clone)]
pub struct IntegerEncoder {
    plain_modulus: BigUInt,
}

impl IntegerEncoder {
    /// Create an encoder for a plaintext modulus.
    pub fn new(plain_modulus: &BigUInt) -> Result<Self> {
        if plain_modulus.significant_bit_count() < 2 {
            return Err(Error::invalid("plain_modulus must be at least 2"));
        }
        Ok(Self {
            plain_modulus: plain_modulus.clone(),
        })
    }

    /// The plaintext modulus.
    pub fn plain_modulus(&self) -> &BigUInt {
        &self.plain_modulus
    }

    /// Build a plaintext polynomial from an integer: coefficient i is bit
    /// i of the value.
    pub fn encode(&self, value: u64) -> BigPoly {
        let bits = 64 - value.leading_zeros() as usize;
        let mut poly = BigPoly::new(
            bits.max(1),
            self.plain_modulus.significant_bit_count(),
        );
        for i in 0..bits {
            if (value >> i) & 1 == 1 {
                poly.set_coeff_u64(i, 1);
            }
        }
        poly
    }

    /// Recover an integer from a plaintext polynomial by evaluating at 2,
    /// interpreting upper-half coefficients as negative.
    ///
    /// Fails with `InvalidArgument` when the result is negative or does
    /// not fit in a `u64`.
    pub fn decode_u64(&self, poly: &BigPoly) -> Result<u64> {
        let value = self.decode_i64(poly)?;
        u64::try_from(value)
            .map_err(|_| Error::invalid("the plaintext decodes to a negative value"))
    }

    /// Recover a signed integer from a plaintext polynomial.
    pub fn decode_i64(&self, poly: &BigPoly) -> Result<i64> {
        let half = {
            let mut h = self.plain_modulus.clone();
            h >>= 1;
            h
        };
        let mut acc: i128 = 0;
        for i in (0..poly.significant_coeff_count()).rev() {
            let coeff = poly.coeff_big_uint(i);
            if coeff >= self.plain_modulus {
                return Err(Error::invalid(
                    "the plaintext has a coefficient outside the plaintext modulus",
                ));
            }
            let centered: i128 = if coeff > half {
                -(((&self.plain_modulus - &coeff).low_u64()) as i128)
            } else {
                coeff.low_u64() as i128
            };
            acc = acc
                .checked_mul(2)
                .and_then(|a| a.checked_add(centered))
                .ok_or_else(|| Error::invalid("the plaintext decodes outside the i64 range"))?;
        }
        i64::try_from(acc)
            .map_err(|_| Error::invalid("the plaintext decodes outside the i64 range"))
    }
}
