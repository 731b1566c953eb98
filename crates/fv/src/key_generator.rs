//! Key generation for the FV scheme.

use std::collections::BTreeMap;
use std::sync::Arc;

use zeroize::Zeroize;

use fv_math::rq::{
    add_poly_poly_coeffmod, multiply_poly_scalar_coeffmod, negate_poly_coeffmod, BigPoly,
    PolyArray,
};
use fv_math::uint::BigUInt;

use crate::keys::{EvaluationKeys, GaloisKeys, PublicKey, SecretKey};
use crate::parameters::FvParameters;
use crate::ring::{apply_galois_poly, canonical_multiply, from_ntt, to_ntt};
use crate::sampling::{sample_poly_normal, sample_poly_ternary, sample_poly_uniform};
use crate::{Error, Result};

/// Generates the secret key, the public key, and on request the
/// evaluation and Galois keys.
#[derive(Debug)]
pub struct KeyGenerator {
    params: Arc<FvParameters>,
    secret_key: SecretKey,
    public_key: PublicKey,
    // The secret key in the power basis, kept for the Galois automorphism.
    secret_key_power_basis: BigPoly,
    // s^1, s^2, ... in the canonical domain, extended on demand.
    secret_key_powers: Vec<BigPoly>,
}

impl Drop for KeyGenerator {
    fn drop(&mut self) {
        self.secret_key_power_basis.zeroize();
        self.secret_key_powers.iter_mut().for_each(Zeroize::zeroize);
    }
}

impl KeyGenerator {
    /// Generate a fresh key pair under the given parameters.
    pub fn new(params: &Arc<FvParameters>) -> Result<Self> {
        if !params.qualifiers().parameters_set {
            return Err(Error::invalid("encryption parameters are not valid"));
        }
        let mut rng = params.create_random_generator();

        // Ternary secret, lifted to positive residues.
        let s_power_basis = sample_poly_ternary(params, rng.as_mut());
        let mut s = s_power_basis.clone();
        if params.qualifiers().enable_ntt {
            to_ntt(params, &mut s)?;
        }

        // pk = (-(a s + e), a) with a uniform and e from the clipped
        // normal distribution.
        let mut a = sample_poly_uniform(params, rng.as_mut());
        let mut e = sample_poly_normal(params, rng.as_mut());
        if params.qualifiers().enable_ntt {
            to_ntt(params, &mut a)?;
            to_ntt(params, &mut e)?;
        }
        let mut a_s = canonical_multiply(params, &a, &s)?;
        let mut pk0 = BigPoly::new(params.degree(), params.coeff_bit_count());
        add_poly_poly_coeffmod(&a_s, &e, &params.coeff_mod, &mut pk0)?;
        let mut neg_pk0 = BigPoly::new(params.degree(), params.coeff_bit_count());
        negate_poly_coeffmod(&pk0, &params.coeff_mod, &mut neg_pk0)?;
        a_s.zeroize();
        e.zeroize();

        let secret_key = SecretKey {
            hash: *params.hash_block(),
            s: s.clone(),
        };
        let public_key = PublicKey {
            hash: *params.hash_block(),
            pk: PolyArray::from_polys(vec![neg_pk0, a])?,
        };

        Ok(Self {
            params: params.clone(),
            secret_key,
            public_key,
            secret_key_power_basis: s_power_basis,
            secret_key_powers: vec![s],
        })
    }

    /// Rebuild a generator around an existing key pair, e.g. to derive
    /// additional evaluation keys later.
    pub fn from_keys(
        params: &Arc<FvParameters>,
        secret_key: SecretKey,
        public_key: PublicKey,
    ) -> Result<Self> {
        if !params.qualifiers().parameters_set {
            return Err(Error::invalid("encryption parameters are not valid"));
        }
        secret_key.matches(params)?;
        public_key.matches(params)?;

        let mut s_power_basis = secret_key.s.clone();
        if params.qualifiers().enable_ntt {
            from_ntt(params, &mut s_power_basis)?;
        }
        let s = secret_key.s.clone();
        Ok(Self {
            params: params.clone(),
            secret_key,
            public_key,
            secret_key_power_basis: s_power_basis,
            secret_key_powers: vec![s],
        })
    }

    /// The secret key.
    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    /// The public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Generate evaluation keys for `count` powers of the secret key with
    /// decomposition bit count `decomposition_bit_count`: key i holds the
    /// base-2^w decomposition keys of s^{i+2}.
    pub fn generate_evaluation_keys(
        &mut self,
        decomposition_bit_count: usize,
        count: usize,
    ) -> Result<EvaluationKeys> {
        let params = self.params.clone();
        self.check_decomposition_bit_count(decomposition_bit_count)?;
        if count == 0 {
            return Err(Error::invalid("count cannot be zero"));
        }
        self.extend_secret_key_powers(count + 1)?;

        let factors = self.evaluation_factors(decomposition_bit_count);
        let mut keys = Vec::with_capacity(count);
        for i in 0..count {
            let s_power = self.secret_key_powers[i + 1].clone();
            keys.push(self.generate_switching_key(&params, &s_power, &factors)?);
        }
        Ok(EvaluationKeys {
            hash: *params.hash_block(),
            decomposition_bit_count,
            keys,
        })
    }

    /// Generate Galois keys for the row-rotation generators 3^{2^i} and
    /// the column-swap element 2n - 1.
    pub fn generate_galois_keys(
        &mut self,
        decomposition_bit_count: usize,
    ) -> Result<GaloisKeys> {
        let params = self.params.clone();
        self.check_decomposition_bit_count(decomposition_bit_count)?;
        let n = params.degree() as u64;
        let m = 2 * n;

        let mut elts = Vec::new();
        let mut power = 1u64;
        while power < n / 2 {
            // 3^{2^i} mod 2n
            let mut elt = 1u64;
            for _ in 0..power {
                elt = (elt * 3) % m;
            }
            elts.push(elt);
            power <<= 1;
        }
        elts.push(m - 1);

        let factors = self.evaluation_factors(decomposition_bit_count);
        let mut keys = BTreeMap::new();
        for elt in elts {
            let mut s_galois = apply_galois_poly(&params, &self.secret_key_power_basis, elt)?;
            if params.qualifiers().enable_ntt {
                to_ntt(&params, &mut s_galois)?;
            }
            let pair = self.generate_switching_key(&params, &s_galois, &factors)?;
            s_galois.zeroize();
            keys.insert(elt, pair);
        }
        Ok(GaloisKeys {
            hash: *params.hash_block(),
            decomposition_bit_count,
            keys,
        })
    }

    fn check_decomposition_bit_count(&self, decomposition_bit_count: usize) -> Result<()> {
        if decomposition_bit_count == 0
            || decomposition_bit_count > self.params.coeff_modulus().significant_bit_count()
        {
            return Err(Error::invalid(
                "decomposition_bit_count must be positive and within the coeff_modulus width",
            ));
        }
        Ok(())
    }

    // The scalars T^j mod q for j = 0 .. ceil(log2 q / w) - 1.
    fn evaluation_factors(&self, decomposition_bit_count: usize) -> Vec<BigUInt> {
        let q = self.params.coeff_modulus();
        let mut factors = Vec::new();
        let mut factor = BigUInt::from(1u64);
        while !factor.is_zero() && factor < *q {
            factors.push(factor.reduce_by(&self.params.coeff_mod));
            factor <<= decomposition_bit_count;
        }
        factors
    }

    // A key-switching key from `target` (canonical domain) to the secret
    // key: one (-(a s + e) + T^j * target, a) pair per decomposition digit.
    fn generate_switching_key(
        &self,
        params: &FvParameters,
        target: &BigPoly,
        factors: &[BigUInt],
    ) -> Result<(PolyArray, PolyArray)> {
        let mut rng = params.create_random_generator();
        let n = params.degree();
        let bits = params.coeff_bit_count();
        let s = &self.secret_key_powers[0];

        let mut ek0 = PolyArray::empty();
        let mut ek1 = PolyArray::empty();
        let mut scratch = BigPoly::new(n, bits);
        let mut shifted_target = BigPoly::new(n, bits);
        for factor in factors {
            let mut a = sample_poly_uniform(params, rng.as_mut());
            let mut e = sample_poly_normal(params, rng.as_mut());
            if params.qualifiers().enable_ntt {
                to_ntt(params, &mut a)?;
                to_ntt(params, &mut e)?;
            }
            let mut a_s = canonical_multiply(params, &a, s)?;
            add_poly_poly_coeffmod(&a_s, &e, &params.coeff_mod, &mut scratch)?;
            let mut b = BigPoly::new(n, bits);
            negate_poly_coeffmod(&scratch, &params.coeff_mod, &mut b)?;
            a_s.zeroize();

            multiply_poly_scalar_coeffmod(
                target,
                factor.as_slice(),
                &params.coeff_mod,
                &mut shifted_target,
            )?;
            let b_clone = b.clone();
            add_poly_poly_coeffmod(&b_clone, &shifted_target, &params.coeff_mod, &mut b)?;
            e.zeroize();

            ek0.push(b)?;
            ek1.push(a)?;
        }
        scratch.zeroize();
        Ok((ek0, ek1))
    }

    fn extend_secret_key_powers(&mut self, up_to: usize) -> Result<()> {
        while self.secret_key_powers.len() < up_to {
            let last = self.secret_key_powers.last().unwrap();
            let next = canonical_multiply(&self.params, last, &self.secret_key_powers[0])?;
            self.secret_key_powers.push(next);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::KeyGenerator;
    use crate::parameters::FvParametersBuilder;
    use fv_math::uint::BigUInt;
    use fv_traits::{DeserializeUsingParameters, Serialize};
    use std::sync::Arc;

    fn ntt_params() -> Arc<crate::parameters::FvParameters> {
        let mut b = FvParametersBuilder::new();
        b.set_poly_modulus_degree(16)
            .unwrap()
            .set_coeff_modulus(&BigUInt::from(65537))
            .unwrap()
            .set_plain_modulus_u64(16)
            .unwrap();
        b.build_arc().unwrap()
    }

    #[test]
    fn test_keygen_shapes() {
        let params = ntt_params();
        let mut keygen = KeyGenerator::new(&params).unwrap();
        assert_eq!(keygen.public_key().pk.size(), 2);
        assert_eq!(keygen.public_key().pk.coeff_count(), 16);

        let evk = keygen.generate_evaluation_keys(6, 2).unwrap();
        assert_eq!(evk.size(), 2);
        assert_eq!(evk.decomposition_bit_count(), 6);
        // ceil(17 / 6) = 3 decomposition digits.
        assert_eq!(evk.key(0).unwrap().0.size(), 3);
        assert_eq!(evk.key(1).unwrap().1.size(), 3);

        assert!(keygen.generate_evaluation_keys(0, 1).is_err());
        assert!(keygen.generate_evaluation_keys(64, 1).is_err());
        assert!(keygen.generate_evaluation_keys(6, 0).is_err());
    }

    #[test]
    fn test_galois_keys_cover_generators() {
        let params = ntt_params();
        let mut keygen = KeyGenerator::new(&params).unwrap();
        let gk = keygen.generate_galois_keys(6).unwrap();
        // n = 16: generators 3^1, 3^2, 3^4 (power < 8) and 2n - 1 = 31.
        assert!(gk.has_key(3));
        assert!(gk.has_key(9));
        assert!(gk.has_key((3u64 * 3 * 3 * 3) % 32));
        assert!(gk.has_key(31));
    }

    #[test]
    fn test_evaluation_keys_serialization_roundtrip() {
        let params = ntt_params();
        let mut keygen = KeyGenerator::new(&params).unwrap();
        let evk = keygen.generate_evaluation_keys(5, 1).unwrap();
        let bytes = evk.to_bytes();
        let back =
            crate::keys::EvaluationKeys::from_bytes(&bytes, &params).unwrap();
        assert_eq!(evk, back);
    }

    #[test]
    fn test_key_serialization_roundtrip() {
        let params = ntt_params();
        let keygen = KeyGenerator::new(&params).unwrap();
        let sk_bytes = keygen.secret_key().to_bytes();
        let pk_bytes = keygen.public_key().to_bytes();
        let sk = crate::keys::SecretKey::from_bytes(&sk_bytes, &params).unwrap();
        let pk = crate::keys::PublicKey::from_bytes(&pk_bytes, &params).unwrap();
        assert_eq!(&sk, keygen.secret_key());
        assert_eq!(&pk, keygen.public_key());

        let keygen2 = KeyGenerator::from_keys(&params, sk, pk).unwrap();
        assert_eq!(keygen2.secret_key(), keygen.secret_key());
    }
}
