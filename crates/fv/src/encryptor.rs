//! Encryption for the FV scheme.

use std::sync::Arc;

use zeroize::Zeroize;

use fv_math::rq::{add_poly_poly_coeffmod, BigPoly, PolyArray};
use fv_math::uint::ops;

use crate::ciphertext::Ciphertext;
use crate::keys::PublicKey;
use crate::parameters::FvParameters;
use crate::ring::{canonical_multiply, from_ntt, to_ntt};
use crate::sampling::{sample_poly_normal, sample_poly_ternary};
use crate::{Error, Result};

/// Encrypts plaintext polynomials under a public key.
#[derive(Debug)]
pub struct Encryptor {
    params: Arc<FvParameters>,
    public_key: PublicKey,
}

impl Encryptor {
    /// Create an encryptor for a parameter set and a matching public key.
    pub fn new(params: &Arc<FvParameters>, public_key: &PublicKey) -> Result<Self> {
        if !params.qualifiers().parameters_set {
            return Err(Error::invalid("encryption parameters are not valid"));
        }
        public_key.matches(params)?;
        Ok(Self {
            params: params.clone(),
            public_key: public_key.clone(),
        })
    }

    /// Encrypt a plaintext polynomial with coefficients in [0, t).
    ///
    /// The ciphertext is (Delta m + pk0 u + e0, pk1 u + e1) with u ternary
    /// and e0, e1 from the clipped normal distribution.
    pub fn encrypt(&self, plain: &BigPoly) -> Result<Ciphertext> {
        let params = &self.params;
        let n = params.degree();
        let bits = params.coeff_bit_count();
        if plain.significant_coeff_count() > n {
            return Err(Error::OutOfRange(
                "plaintext has more coefficients than the polynomial modulus degree".to_string(),
            ));
        }
        if !plain.are_coefficients_less_than(params.plain_mod.as_slice()) {
            return Err(Error::invalid(
                "plaintext has a coefficient outside the plaintext modulus",
            ));
        }

        // Delta * m, recentered into the upper half of [0, q) where the
        // plaintext coefficient is in the upper half of [0, t).
        let mut c0 = preencrypt(params, plain)?;

        let mut rng = params.create_random_generator();
        let mut u = sample_poly_ternary(params, rng.as_mut());

        let (pk0_u, pk1_u) = if params.qualifiers().enable_ntt {
            let mut u_ntt = u.clone();
            to_ntt(params, &mut u_ntt)?;
            let mut p0 = canonical_multiply(params, &u_ntt, &self.public_key.pk[0])?;
            let mut p1 = canonical_multiply(params, &u_ntt, &self.public_key.pk[1])?;
            from_ntt(params, &mut p0)?;
            from_ntt(params, &mut p1)?;
            u_ntt.zeroize();
            (p0, p1)
        } else {
            (
                canonical_multiply(params, &u, &self.public_key.pk[0])?,
                canonical_multiply(params, &u, &self.public_key.pk[1])?,
            )
        };
        u.zeroize();

        let mut scratch = BigPoly::new(n, bits);
        add_poly_poly_coeffmod(&c0, &pk0_u, &params.coeff_mod, &mut scratch)?;
        let mut e0 = sample_poly_normal(params, rng.as_mut());
        add_poly_poly_coeffmod(&scratch, &e0, &params.coeff_mod, &mut c0)?;
        e0.zeroize();

        let mut c1 = BigPoly::new(n, bits);
        let mut e1 = sample_poly_normal(params, rng.as_mut());
        add_poly_poly_coeffmod(&pk1_u, &e1, &params.coeff_mod, &mut c1)?;
        e1.zeroize();
        scratch.zeroize();

        Ok(Ciphertext::new(
            params,
            PolyArray::from_polys(vec![c0, c1])?,
            false,
        ))
    }
}

/// Lift a plaintext into R_q: multiply each coefficient by Delta and add
/// the upper-half increment where the lifted coefficient reaches the
/// upper-half threshold, so that decryption rounding stays balanced.
pub(crate) fn preencrypt(params: &FvParameters, plain: &BigPoly) -> Result<BigPoly> {
    let n = params.degree();
    let bits = params.coeff_bit_count();
    let limbs = params.coeff_uint64_count();
    let mut out = BigPoly::new(n, bits);
    let mut lifted = vec![0u64; limbs];
    for i in 0..plain.significant_coeff_count().min(n) {
        ops::multiply_truncate_uint_uint(
            &widen(plain.coeff(i), limbs),
            params.coeff_div_plain_modulus.as_slice(),
            &mut lifted,
        );
        if ops::is_greater_than_or_equal_uint_uint(
            &lifted,
            params.upper_half_threshold.as_slice(),
        ) {
            ops::add_uint_uint_inplace(&mut lifted, params.upper_half_increment.as_slice());
        }
        out.coeff_mut(i).copy_from_slice(&lifted);
    }
    Ok(out)
}

fn widen(value: &[u64], limbs: usize) -> Vec<u64> {
    let mut out = vec![0u64; limbs];
    ops::set_uint_uint(value, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::{preencrypt, Encryptor};
    use crate::key_generator::KeyGenerator;
    use crate::parameters::FvParametersBuilder;
    use fv_math::rq::BigPoly;
    use fv_math::uint::BigUInt;

    #[test]
    fn test_preencrypt_centering() {
        // q = 65537, t = 16: Delta = 4096, threshold = 8 * 4096,
        // increment = 1.
        let params = {
            let mut b = FvParametersBuilder::new();
            b.set_poly_modulus_degree(16)
                .unwrap()
                .set_coeff_modulus(&BigUInt::from(65537))
                .unwrap()
                .set_plain_modulus_u64(16)
                .unwrap();
            b.build().unwrap()
        };
        let plain = BigPoly::from_u64_coeffs(&[1, 7, 8, 15], 16);
        let lifted = preencrypt(&params, &plain).unwrap();
        assert_eq!(lifted.coeff_big_uint(0), BigUInt::from(4096));
        assert_eq!(lifted.coeff_big_uint(1), BigUInt::from(7 * 4096));
        // 8 and above land in the upper half and get the increment.
        assert_eq!(lifted.coeff_big_uint(2), BigUInt::from(8 * 4096 + 1));
        assert_eq!(lifted.coeff_big_uint(3), BigUInt::from(15 * 4096 + 1));
        assert_eq!(lifted.coeff_big_uint(4), BigUInt::zero());
    }

    #[test]
    fn test_encrypt_validates_plaintext() {
        let params = {
            let mut b = FvParametersBuilder::new();
            b.set_poly_modulus_degree(16)
                .unwrap()
                .set_coeff_modulus(&BigUInt::from(65537))
                .unwrap()
                .set_plain_modulus_u64(16)
                .unwrap();
            b.build_arc().unwrap()
        };
        let keygen = KeyGenerator::new(&params).unwrap();
        let encryptor = Encryptor::new(&params, keygen.public_key()).unwrap();

        let too_long = BigPoly::from_u64_coeffs(&[1; 17], 16);
        assert!(encryptor.encrypt(&too_long).is_err());

        let too_big = BigPoly::from_u64_coeffs(&[16], 16);
        assert!(encryptor.encrypt(&too_big).is_err());

        let ok = BigPoly::from_u64_coeffs(&[1, 2, 3], 16);
        let ct = encryptor.encrypt(&ok).unwrap();
        assert_eq!(ct.size(), 2);
        assert!(!ct.is_ntt_form());
    }
}
