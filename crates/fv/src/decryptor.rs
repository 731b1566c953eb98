//! Decryption and noise measurement for the FV scheme.

use std::sync::Arc;

use zeroize::Zeroize;

use fv_math::rq::{
    add_poly_poly_coeffmod, multiply_poly_scalar_coeffmod, poly_infty_norm_coeffmod, BigPoly,
};
use fv_math::uint::ops;

use crate::ciphertext::Ciphertext;
use crate::keys::SecretKey;
use crate::parameters::FvParameters;
use crate::ring::canonical_multiply;
use crate::{Error, Result};

/// Decrypts ciphertexts with a secret key.
#[derive(Debug)]
pub struct Decryptor {
    params: Arc<FvParameters>,
    // The secret key in the canonical domain.
    s: BigPoly,
}

impl Drop for Decryptor {
    fn drop(&mut self) {
        self.s.zeroize();
    }
}

impl Decryptor {
    /// Create a decryptor for a parameter set and a matching secret key.
    pub fn new(params: &Arc<FvParameters>, secret_key: &SecretKey) -> Result<Self> {
        if !params.qualifiers().parameters_set {
            return Err(Error::invalid("encryption parameters are not valid"));
        }
        secret_key.matches(params)?;
        Ok(Self {
            params: params.clone(),
            s: secret_key.s.clone(),
        })
    }

    /// Decrypt a ciphertext of any size: evaluate c0 + c1 s + c2 s^2 + ...
    /// by Horner's rule, scale by t/q with rounding to nearest, and reduce
    /// mod t.
    pub fn decrypt(&self, encrypted: &Ciphertext) -> Result<BigPoly> {
        let params = &self.params;
        encrypted.validate(params, "encrypted")?;
        if encrypted.is_ntt_form() {
            return Err(Error::logic("cannot decrypt a ciphertext in NTT form"));
        }

        let mut dot = self.dot_product_with_key_powers(encrypted)?;
        let plain = self.scale_to_plain(&dot)?;
        dot.zeroize();
        Ok(plain)
    }

    /// The invariant noise budget of a ciphertext, in bits: the log
    /// distance between the invariant noise and the decryption threshold.
    /// Zero means decryption is expected to fail.
    pub fn invariant_noise_budget(&self, encrypted: &Ciphertext) -> Result<usize> {
        let params = &self.params;
        encrypted.validate(params, "encrypted")?;
        if encrypted.is_ntt_form() {
            return Err(Error::logic(
                "cannot measure a ciphertext in NTT form",
            ));
        }

        // The invariant noise scaled by q is t * <c, (1, s, s^2, ...)>
        // mod q, interpreted centered.
        let dot = self.dot_product_with_key_powers(encrypted)?;
        let limbs = params.coeff_uint64_count();
        let mut t_wide = vec![0u64; limbs];
        ops::set_uint_uint(params.plain_modulus().as_slice(), &mut t_wide);
        let mut scaled = BigPoly::new(params.degree(), params.coeff_bit_count());
        multiply_poly_scalar_coeffmod(&dot, &t_wide, &params.coeff_mod, &mut scaled)?;

        let norm = poly_infty_norm_coeffmod(&scaled, &params.coeff_mod);
        let budget = params
            .coeff_bit_count()
            .saturating_sub(norm.significant_bit_count() + 1);
        Ok(budget)
    }

    // c0 + c1 s + c2 s^2 + ... in the power basis, via Horner in the
    // canonical domain. Only s itself is needed, whatever the size.
    fn dot_product_with_key_powers(&self, encrypted: &Ciphertext) -> Result<BigPoly> {
        let params = &self.params;
        let size = encrypted.size();
        let use_ntt = params.qualifiers().enable_ntt;

        let canonical = |poly: &BigPoly| -> Result<BigPoly> {
            let mut out = poly.clone();
            if use_ntt {
                crate::ring::to_ntt(params, &mut out)?;
            }
            Ok(out)
        };

        let mut acc = canonical(&encrypted.polys[size - 1])?;
        for i in (0..size - 1).rev() {
            let acc_s = canonical_multiply(params, &acc, &self.s)?;
            let ci = canonical(&encrypted.polys[i])?;
            add_poly_poly_coeffmod(&acc_s, &ci, &params.coeff_mod, &mut acc)?;
        }
        if use_ntt {
            crate::ring::from_ntt(params, &mut acc)?;
        }
        Ok(acc)
    }

    // Multiply by t, divide by q rounding to nearest, reduce mod t.
    fn scale_to_plain(&self, dot: &BigPoly) -> Result<BigPoly> {
        let params = &self.params;
        let limbs = params.coeff_uint64_count();
        let plain_bits = params.plain_modulus().significant_bit_count();
        let wide_limbs = limbs + params.plain_mod.uint64_count();

        let mut out = BigPoly::new(params.degree(), plain_bits);
        let mut wide = vec![0u64; wide_limbs];
        let mut quotient = vec![0u64; wide_limbs];
        let mut q_wide = vec![0u64; wide_limbs];
        ops::set_uint_uint(params.coeff_mod.as_slice(), &mut q_wide);

        for i in 0..params.degree() {
            ops::multiply_uint_uint(dot.coeff(i), params.plain_modulus().as_slice(), &mut wide);
            ops::add_uint_uint_inplace(&mut wide, params.coeff_modulus_div_two.as_slice());
            ops::divide_uint_uint_inplace(&mut wide, &q_wide, &mut quotient);
            params.plain_mod.modulo_uint_inplace(&mut quotient)?;
            ops::set_uint_uint(&quotient[..params.plain_mod.uint64_count()], out.coeff_mut(i));
        }
        Ok(out)
    }
}
