//! Homomorphic evaluation for the FV scheme.

use std::sync::Arc;

use itertools::izip;

use fv_math::ntt::{inverse_ntt_negacyclic_harvey, ntt_negacyclic_harvey};
use fv_math::nussbaumer::{
    nussbaumer_cross_multiply_poly_poly, nussbaumer_multiply_poly_poly,
    nussbaumer_multiply_poly_poly_coeffmod,
};
use fv_math::rq::{
    add_poly_poly_coeffmod, dyadic_product_coeffmod, negate_poly_coeffmod, sub_poly_poly_coeffmod,
    BigPoly, PolyArray,
};
use fv_math::uint::ops::{self, BITS_PER_U64};
use fv_util::div_ceil;

use crate::ciphertext::Ciphertext;
use crate::encryptor::preencrypt;
use crate::keys::{EvaluationKeys, GaloisKeys};
use crate::parameters::FvParameters;
use crate::ring::{apply_galois_poly, from_ntt, to_ntt};
use crate::{Error, Result};

/// Evaluates homomorphic operations on ciphertexts.
///
/// All operations are total functions of their inputs: they either return
/// the complete result or fail without producing one. The multiplication
/// back-end was fixed when the parameters were validated.
#[derive(Debug)]
pub struct Evaluator {
    params: Arc<FvParameters>,
    evaluation_keys: Option<EvaluationKeys>,
    galois_keys: Option<GaloisKeys>,
}

impl Evaluator {
    /// Create an evaluator without relinearization or rotation support.
    pub fn new(params: &Arc<FvParameters>) -> Result<Self> {
        if !params.qualifiers().parameters_set {
            return Err(Error::invalid("encryption parameters are not valid"));
        }
        Ok(Self {
            params: params.clone(),
            evaluation_keys: None,
            galois_keys: None,
        })
    }

    /// Attach evaluation keys, enabling relinearization.
    pub fn with_evaluation_keys(mut self, keys: EvaluationKeys) -> Result<Self> {
        keys.matches(&self.params)?;
        self.evaluation_keys = Some(keys);
        Ok(self)
    }

    /// Attach Galois keys, enabling rotations.
    pub fn with_galois_keys(mut self, keys: GaloisKeys) -> Result<Self> {
        keys.matches(&self.params)?;
        self.galois_keys = Some(keys);
        Ok(self)
    }

    /// Negate a ciphertext.
    pub fn negate(&self, encrypted: &Ciphertext) -> Result<Ciphertext> {
        encrypted.validate(&self.params, "encrypted")?;
        let mut polys = PolyArray::empty();
        for poly in encrypted.polys.iter() {
            let mut out = BigPoly::new(self.params.degree(), self.params.coeff_bit_count());
            negate_poly_coeffmod(poly, &self.params.coeff_mod, &mut out)?;
            polys.push(out)?;
        }
        Ok(Ciphertext::new(&self.params, polys, encrypted.ntt_form))
    }

    /// Add two ciphertexts; the result has the size of the larger input.
    pub fn add(&self, encrypted1: &Ciphertext, encrypted2: &Ciphertext) -> Result<Ciphertext> {
        self.check_pair(encrypted1, encrypted2)?;
        let (larger, smaller) = if encrypted1.size() >= encrypted2.size() {
            (encrypted1, encrypted2)
        } else {
            (encrypted2, encrypted1)
        };
        let mut polys = PolyArray::empty();
        for i in 0..larger.size() {
            if i < smaller.size() {
                let mut out = BigPoly::new(self.params.degree(), self.params.coeff_bit_count());
                add_poly_poly_coeffmod(
                    &larger.polys[i],
                    &smaller.polys[i],
                    &self.params.coeff_mod,
                    &mut out,
                )?;
                polys.push(out)?;
            } else {
                polys.push(larger.polys[i].clone())?;
            }
        }
        Ok(Ciphertext::new(&self.params, polys, encrypted1.ntt_form))
    }

    /// Add a sequence of ciphertexts.
    pub fn add_many(&self, encrypteds: &[Ciphertext]) -> Result<Ciphertext> {
        let (first, rest) = encrypteds
            .split_first()
            .ok_or_else(|| Error::invalid("encrypteds cannot be empty"))?;
        let mut acc = first.clone();
        for ct in rest {
            acc = self.add(&acc, ct)?;
        }
        Ok(acc)
    }

    /// Subtract `encrypted2` from `encrypted1`.
    pub fn sub(&self, encrypted1: &Ciphertext, encrypted2: &Ciphertext) -> Result<Ciphertext> {
        self.check_pair(encrypted1, encrypted2)?;
        let size = encrypted1.size().max(encrypted2.size());
        let n = self.params.degree();
        let bits = self.params.coeff_bit_count();
        let zero = BigPoly::new(n, bits);
        let mut polys = PolyArray::empty();
        for i in 0..size {
            let a = if i < encrypted1.size() {
                &encrypted1.polys[i]
            } else {
                &zero
            };
            let b = if i < encrypted2.size() {
                &encrypted2.polys[i]
            } else {
                &zero
            };
            let mut out = BigPoly::new(n, bits);
            sub_poly_poly_coeffmod(a, b, &self.params.coeff_mod, &mut out)?;
            polys.push(out)?;
        }
        Ok(Ciphertext::new(&self.params, polys, encrypted1.ntt_form))
    }

    /// Multiply two ciphertexts; the result has size s1 + s2 - 1 and must
    /// usually be relinearized afterwards.
    pub fn multiply(&self, encrypted1: &Ciphertext, encrypted2: &Ciphertext) -> Result<Ciphertext> {
        self.check_pair(encrypted1, encrypted2)?;
        self.require_power_basis(encrypted1)?;
        self.require_power_basis(encrypted2)?;

        let q = self.params.qualifiers();
        if q.enable_ntt_in_multiply {
            self.ntt_multiply(encrypted1, encrypted2)
        } else if q.enable_nussbaumer {
            self.nussbaumer_multiply(encrypted1, encrypted2)
        } else {
            Err(Error::logic("invalid encryption parameters"))
        }
    }

    /// Square a ciphertext; for size-2 inputs a three-product shortcut is
    /// used.
    pub fn square(&self, encrypted: &Ciphertext) -> Result<Ciphertext> {
        encrypted.validate(&self.params, "encrypted")?;
        self.require_power_basis(encrypted)?;
        let q = self.params.qualifiers();
        if encrypted.size() != 2 {
            return self.multiply(encrypted, encrypted);
        }
        if q.enable_ntt_in_multiply {
            // The dyadic accumulation already shares the transforms.
            self.ntt_multiply(encrypted, encrypted)
        } else if q.enable_nussbaumer {
            self.nussbaumer_square(encrypted)
        } else {
            Err(Error::logic("invalid encryption parameters"))
        }
    }

    /// Relinearize a ciphertext down to `destination_size` polynomials
    /// using the attached evaluation keys.
    pub fn relinearize(
        &self,
        encrypted: &Ciphertext,
        destination_size: usize,
    ) -> Result<Ciphertext> {
        encrypted.validate(&self.params, "encrypted")?;
        self.require_power_basis(encrypted)?;
        let size = encrypted.size();
        if destination_size < 2 || destination_size > size {
            return Err(Error::invalid(
                "destination_size must be at least 2 and at most the current size",
            ));
        }
        if destination_size == size {
            return Ok(encrypted.clone());
        }
        let keys = self
            .evaluation_keys
            .as_ref()
            .ok_or_else(|| Error::logic("no evaluation keys are configured"))?;
        if keys.size() + 2 < size {
            return Err(Error::logic("not enough evaluation keys"));
        }

        let mut polys: Vec<BigPoly> = encrypted.polys.iter().cloned().collect();
        while polys.len() > destination_size {
            self.relinearize_one_step(&mut polys, keys)?;
        }
        Ok(Ciphertext::new(
            &self.params,
            PolyArray::from_polys(polys)?,
            false,
        ))
    }

    /// Multiply a sequence of ciphertexts with a balanced tree,
    /// relinearizing to size 2 after every product.
    pub fn multiply_many(&self, encrypteds: &[Ciphertext]) -> Result<Ciphertext> {
        if encrypteds.is_empty() {
            return Err(Error::invalid("encrypteds cannot be empty"));
        }
        let mut queue: Vec<Ciphertext> = encrypteds.to_vec();
        let mut i = 0;
        while i + 1 < queue.len() {
            let product = self.multiply(&queue[i], &queue[i + 1])?;
            queue.push(self.relinearize(&product, 2)?);
            i += 2;
        }
        Ok(queue.pop().unwrap())
    }

    /// Raise a ciphertext to a positive power.
    pub fn exponentiate(&self, encrypted: &Ciphertext, exponent: u64) -> Result<Ciphertext> {
        if exponent == 0 {
            return Err(Error::invalid("exponent cannot be zero"));
        }
        encrypted.validate(&self.params, "encrypted")?;
        if exponent == 1 {
            return Ok(encrypted.clone());
        }
        let copies = vec![encrypted.clone(); exponent as usize];
        self.multiply_many(&copies)
    }

    /// Add a plaintext polynomial to a ciphertext.
    pub fn add_plain(&self, encrypted: &Ciphertext, plain: &BigPoly) -> Result<Ciphertext> {
        encrypted.validate(&self.params, "encrypted")?;
        self.require_power_basis(encrypted)?;
        self.check_plain(plain)?;
        let lifted = preencrypt(&self.params, plain)?;
        let mut out = encrypted.clone();
        let c0 = out.polys[0].clone();
        add_poly_poly_coeffmod(&c0, &lifted, &self.params.coeff_mod, &mut out.polys[0])?;
        Ok(out)
    }

    /// Subtract a plaintext polynomial from a ciphertext.
    pub fn sub_plain(&self, encrypted: &Ciphertext, plain: &BigPoly) -> Result<Ciphertext> {
        encrypted.validate(&self.params, "encrypted")?;
        self.require_power_basis(encrypted)?;
        self.check_plain(plain)?;
        let lifted = preencrypt(&self.params, plain)?;
        let mut out = encrypted.clone();
        let c0 = out.polys[0].clone();
        sub_poly_poly_coeffmod(&c0, &lifted, &self.params.coeff_mod, &mut out.polys[0])?;
        Ok(out)
    }

    /// Multiply a ciphertext by a nonzero plaintext polynomial.
    pub fn multiply_plain(&self, encrypted: &Ciphertext, plain: &BigPoly) -> Result<Ciphertext> {
        encrypted.validate(&self.params, "encrypted")?;
        self.require_power_basis(encrypted)?;
        self.check_plain(plain)?;
        if plain.is_zero() {
            return Err(Error::invalid("plain cannot be zero"));
        }
        let adjusted = self.recenter_plain(plain);

        let mut polys = PolyArray::empty();
        if self.params.qualifiers().enable_ntt {
            let mut plain_ntt = adjusted;
            to_ntt(&self.params, &mut plain_ntt)?;
            for poly in encrypted.polys.iter() {
                let mut component = poly.clone();
                to_ntt(&self.params, &mut component)?;
                let mut product =
                    BigPoly::new(self.params.degree(), self.params.coeff_bit_count());
                dyadic_product_coeffmod(
                    &component,
                    &plain_ntt,
                    &self.params.coeff_mod,
                    &mut product,
                )?;
                from_ntt(&self.params, &mut product)?;
                polys.push(product)?;
            }
        } else {
            for poly in encrypted.polys.iter() {
                let mut product =
                    BigPoly::new(self.params.degree(), self.params.coeff_bit_count());
                nussbaumer_multiply_poly_poly_coeffmod(
                    poly,
                    &adjusted,
                    self.params.polymod.coeff_count_power(),
                    &self.params.coeff_mod,
                    &mut product,
                )?;
                polys.push(product)?;
            }
        }
        Ok(Ciphertext::new(&self.params, polys, false))
    }

    /// Lift a plaintext into R_q and transform it to the NTT domain.
    pub fn transform_plain_to_ntt(&self, plain: &BigPoly) -> Result<BigPoly> {
        self.check_plain(plain)?;
        let mut out = self.recenter_plain(plain);
        to_ntt(&self.params, &mut out)?;
        Ok(out)
    }

    /// Transform an NTT-domain plaintext back to its [0, t) coefficients.
    pub fn transform_plain_from_ntt(&self, plain_ntt: &BigPoly) -> Result<BigPoly> {
        if plain_ntt.coeff_count() != self.params.degree()
            || plain_ntt.coeff_bit_count() != self.params.coeff_bit_count()
        {
            return Err(Error::invalid("plain_ntt has the wrong shape"));
        }
        let mut out = plain_ntt.clone();
        from_ntt(&self.params, &mut out)?;
        // Undo the upper-half recentering.
        let increment = self.params.plain_upper_half_increment.as_slice();
        for i in 0..out.coeff_count() {
            let coeff = out.coeff_mut(i);
            if ops::is_greater_than_or_equal_uint_uint(coeff, increment) {
                ops::sub_uint_uint_inplace(coeff, increment);
            }
        }
        let plain_bits = self.params.plain_modulus().significant_bit_count();
        let mut narrowed = BigPoly::new(self.params.degree(), plain_bits);
        for i in 0..out.coeff_count() {
            ops::set_uint_uint(out.coeff(i), narrowed.coeff_mut(i));
        }
        Ok(narrowed)
    }

    /// Transform a ciphertext into the NTT domain.
    pub fn transform_to_ntt(&self, encrypted: &Ciphertext) -> Result<Ciphertext> {
        encrypted.validate(&self.params, "encrypted")?;
        self.require_power_basis(encrypted)?;
        let mut out = encrypted.clone();
        for poly in out.polys.iter_mut() {
            ntt_negacyclic_harvey(
                poly.as_mut_slice(),
                self.params
                    .ntt_tables
                    .as_ref()
                    .ok_or_else(|| Error::logic("the NTT is not enabled for these parameters"))?,
            );
        }
        out.ntt_form = true;
        Ok(out)
    }

    /// Transform a ciphertext out of the NTT domain.
    pub fn transform_from_ntt(&self, encrypted_ntt: &Ciphertext) -> Result<Ciphertext> {
        encrypted_ntt.validate(&self.params, "encrypted_ntt")?;
        if !encrypted_ntt.ntt_form {
            return Err(Error::logic("the ciphertext is not in NTT form"));
        }
        let mut out = encrypted_ntt.clone();
        for poly in out.polys.iter_mut() {
            inverse_ntt_negacyclic_harvey(
                poly.as_mut_slice(),
                self.params
                    .ntt_tables
                    .as_ref()
                    .ok_or_else(|| Error::logic("the NTT is not enabled for these parameters"))?,
            );
        }
        out.ntt_form = false;
        Ok(out)
    }

    /// Dyadic product of an NTT-form ciphertext with an NTT-form
    /// plaintext; the result stays in the NTT domain.
    pub fn multiply_plain_ntt(
        &self,
        encrypted_ntt: &Ciphertext,
        plain_ntt: &BigPoly,
    ) -> Result<Ciphertext> {
        encrypted_ntt.validate(&self.params, "encrypted_ntt")?;
        if !encrypted_ntt.ntt_form {
            return Err(Error::logic("the ciphertext is not in NTT form"));
        }
        if plain_ntt.is_zero() {
            return Err(Error::invalid("plain_ntt cannot be zero"));
        }
        let mut polys = PolyArray::empty();
        for poly in encrypted_ntt.polys.iter() {
            let mut product = BigPoly::new(self.params.degree(), self.params.coeff_bit_count());
            dyadic_product_coeffmod(poly, plain_ntt, &self.params.coeff_mod, &mut product)?;
            polys.push(product)?;
        }
        Ok(Ciphertext::new(&self.params, polys, true))
    }

    /// Apply the automorphism x -> x^galois_elt to a size-2 ciphertext and
    /// switch it back under the secret key, using the attached Galois
    /// keys.
    pub fn apply_galois(&self, encrypted: &Ciphertext, galois_elt: u64) -> Result<Ciphertext> {
        encrypted.validate(&self.params, "encrypted")?;
        self.require_power_basis(encrypted)?;
        if encrypted.size() != 2 {
            return Err(Error::invalid(
                "Galois automorphisms require a size-2 ciphertext",
            ));
        }
        if galois_elt == 1 {
            return Ok(encrypted.clone());
        }
        let keys = self
            .galois_keys
            .as_ref()
            .ok_or_else(|| Error::logic("no Galois keys are configured"))?;
        let key = keys
            .key(galois_elt)
            .ok_or_else(|| Error::logic("no Galois key for the requested element"))?;

        let c0_perm = apply_galois_poly(&self.params, &encrypted.polys[0], galois_elt)?;
        let c1_perm = apply_galois_poly(&self.params, &encrypted.polys[1], galois_elt)?;

        let (sum0, sum1) = self.switching_sums(&c1_perm, key, keys.decomposition_bit_count)?;
        let mut c0 = BigPoly::new(self.params.degree(), self.params.coeff_bit_count());
        add_poly_poly_coeffmod(&c0_perm, &sum0, &self.params.coeff_mod, &mut c0)?;

        Ok(Ciphertext::new(
            &self.params,
            PolyArray::from_polys(vec![c0, sum1])?,
            false,
        ))
    }

    /// Rotate the rows of a size-2 ciphertext by `steps` slots (positive
    /// rotates left), composing the power-of-two Galois generators.
    pub fn rotate_rows(&self, encrypted: &Ciphertext, steps: i64) -> Result<Ciphertext> {
        let n = self.params.degree() as i64;
        let row_size = n / 2;
        if row_size < 1 {
            return Err(Error::logic("the ring is too small for rotations"));
        }
        let steps = steps.rem_euclid(row_size) as u64;
        if steps == 0 {
            encrypted.validate(&self.params, "encrypted")?;
            return Ok(encrypted.clone());
        }
        let m = 2 * self.params.degree() as u64;
        let mut out = encrypted.clone();
        let mut generator_power = 3u64 % m;
        let mut remaining = steps;
        while remaining != 0 {
            if remaining & 1 == 1 {
                out = self.apply_galois(&out, generator_power)?;
            }
            remaining >>= 1;
            generator_power = (generator_power * generator_power) % m;
        }
        Ok(out)
    }

    /// Swap the two rows of a size-2 ciphertext (the automorphism with
    /// element 2n - 1).
    pub fn rotate_columns(&self, encrypted: &Ciphertext) -> Result<Ciphertext> {
        let m = 2 * self.params.degree() as u64;
        self.apply_galois(encrypted, m - 1)
    }

    fn check_pair(&self, a: &Ciphertext, b: &Ciphertext) -> Result<()> {
        a.validate(&self.params, "encrypted1")?;
        b.validate(&self.params, "encrypted2")?;
        if a.ntt_form != b.ntt_form {
            return Err(Error::logic("operands live in different domains"));
        }
        Ok(())
    }

    fn require_power_basis(&self, ct: &Ciphertext) -> Result<()> {
        if ct.ntt_form {
            return Err(Error::logic(
                "the operation requires a power-basis ciphertext",
            ));
        }
        Ok(())
    }

    fn check_plain(&self, plain: &BigPoly) -> Result<()> {
        if plain.significant_coeff_count() > self.params.degree() {
            return Err(Error::OutOfRange(
                "plaintext has more coefficients than the polynomial modulus degree".to_string(),
            ));
        }
        if !plain.are_coefficients_less_than(self.params.plain_mod.as_slice()) {
            return Err(Error::invalid(
                "plaintext has a coefficient outside the plaintext modulus",
            ));
        }
        Ok(())
    }

    // Map plaintext coefficients in the upper half of [0, t) to their
    // mod-q negatives so products act on centered values.
    fn recenter_plain(&self, plain: &BigPoly) -> BigPoly {
        let n = self.params.degree();
        let bits = self.params.coeff_bit_count();
        let mut out = BigPoly::new(n, bits);
        for i in 0..plain.significant_coeff_count().min(n) {
            let dst = out.coeff_mut(i);
            ops::set_uint_uint(plain.coeff(i), dst);
            if ops::is_greater_than_or_equal_uint_uint(
                dst,
                self.params.plain_upper_half_threshold.as_slice(),
            ) {
                ops::add_uint_uint_inplace(
                    dst,
                    self.params.plain_upper_half_increment.as_slice(),
                );
            }
        }
        out
    }

    // One relinearization step: decompose the last component in base 2^w
    // and fold it into c0, c1 through the evaluation key for its secret
    // power.
    fn relinearize_one_step(
        &self,
        polys: &mut Vec<BigPoly>,
        keys: &EvaluationKeys,
    ) -> Result<()> {
        let size = polys.len();
        debug_assert!(size >= 3);
        let key = keys
            .key(size - 3)
            .ok_or_else(|| Error::logic("not enough evaluation keys"))?;
        let last = polys.pop().unwrap();
        let (sum0, sum1) = self.switching_sums(&last, key, keys.decomposition_bit_count)?;

        let c0 = polys[0].clone();
        add_poly_poly_coeffmod(&c0, &sum0, &self.params.coeff_mod, &mut polys[0])?;
        let c1 = polys[1].clone();
        add_poly_poly_coeffmod(&c1, &sum1, &self.params.coeff_mod, &mut polys[1])?;
        Ok(())
    }

    // (sum_j ek0_j * d_j, sum_j ek1_j * d_j) for the base-2^w digits d_j
    // of `target`.
    fn switching_sums(
        &self,
        target: &BigPoly,
        key: &(PolyArray, PolyArray),
        decomposition_bit_count: usize,
    ) -> Result<(BigPoly, BigPoly)> {
        let params = &self.params;
        let n = params.degree();
        let bits = params.coeff_bit_count();
        let ell = key.0.size();

        let mut sum0 = BigPoly::new(n, bits);
        let mut sum1 = BigPoly::new(n, bits);
        let mut product = BigPoly::new(n, bits);
        let mut scratch = BigPoly::new(n, bits);
        for j in 0..ell {
            // Digit j: w bits starting at j * w, per coefficient.
            let mut digit = BigPoly::new(n, bits);
            for c in 0..n {
                let dst = digit.coeff_mut(c);
                ops::set_uint_uint(target.coeff(c), dst);
                ops::right_shift_uint_inplace(dst, j * decomposition_bit_count);
                ops::filter_highbits_uint(dst, decomposition_bit_count);
            }

            if params.qualifiers().enable_ntt {
                to_ntt(params, &mut digit)?;
                dyadic_product_coeffmod(&digit, &key.0[j], &params.coeff_mod, &mut product)?;
                let s0 = sum0.clone();
                add_poly_poly_coeffmod(&s0, &product, &params.coeff_mod, &mut sum0)?;
                dyadic_product_coeffmod(&digit, &key.1[j], &params.coeff_mod, &mut product)?;
                let s1 = sum1.clone();
                add_poly_poly_coeffmod(&s1, &product, &params.coeff_mod, &mut sum1)?;
            } else {
                nussbaumer_multiply_poly_poly_coeffmod(
                    &key.0[j],
                    &digit,
                    params.polymod.coeff_count_power(),
                    &params.coeff_mod,
                    &mut product,
                )?;
                add_poly_poly_coeffmod(&sum0.clone(), &product, &params.coeff_mod, &mut scratch)?;
                std::mem::swap(&mut sum0, &mut scratch);
                nussbaumer_multiply_poly_poly_coeffmod(
                    &key.1[j],
                    &digit,
                    params.polymod.coeff_count_power(),
                    &params.coeff_mod,
                    &mut product,
                )?;
                add_poly_poly_coeffmod(&sum1.clone(), &product, &params.coeff_mod, &mut scratch)?;
                std::mem::swap(&mut sum1, &mut scratch);
            }
        }
        if params.qualifiers().enable_ntt {
            from_ntt(params, &mut sum0)?;
            from_ntt(params, &mut sum1)?;
        }
        Ok((sum0, sum1))
    }

    // Ciphertext multiplication through the Nussbaumer convolution: exact
    // integer sums of products in a wide two's-complement accumulator,
    // then the t/q rounding with sign restoration.
    fn nussbaumer_multiply(
        &self,
        encrypted1: &Ciphertext,
        encrypted2: &Ciphertext,
    ) -> Result<Ciphertext> {
        let params = &self.params;
        let n = params.degree();
        let k = params.polymod.coeff_count_power();
        let limbs = params.coeff_uint64_count();
        let bits = params.coeff_bit_count();
        let s1 = encrypted1.size();
        let s2 = encrypted2.size();
        let dest_count = s1 + s2 - 1;

        // One extra limb keeps the unsigned residues (and the size-2
        // shortcut's coefficient sums) clear of the sign bit.
        let op_limbs = limbs + 1;
        let product_bits =
            2 * bits + k + 1 + ops::significant_bit_count_uint(&[s1.min(s2) as u64]);
        let product_limbs = div_ceil(product_bits, BITS_PER_U64);

        let flat1: Vec<Vec<u64>> = encrypted1
            .polys
            .iter()
            .map(|p| widen_poly(p, op_limbs))
            .collect();
        let flat2: Vec<Vec<u64>> = encrypted2
            .polys
            .iter()
            .map(|p| widen_poly(p, op_limbs))
            .collect();

        let mut polys = PolyArray::empty();
        if s1 == 2 && s2 == 2 {
            // Three convolutions instead of four:
            // (c0 d0, c1 d1, (c0 + c1)(d0 + d1) - c0 d0 - c1 d1).
            let mut t0 = vec![0u64; n * product_limbs];
            let mut t2 = vec![0u64; n * product_limbs];
            let mut t1 = vec![0u64; n * product_limbs];
            nussbaumer_multiply_poly_poly(&flat1[0], &flat2[0], k, op_limbs, product_limbs, &mut t0);
            nussbaumer_multiply_poly_poly(&flat1[1], &flat2[1], k, op_limbs, product_limbs, &mut t2);
            let sum1 = add_flat(&flat1[0], &flat1[1], op_limbs);
            let sum2 = add_flat(&flat2[0], &flat2[1], op_limbs);
            nussbaumer_multiply_poly_poly(&sum1, &sum2, k, op_limbs, product_limbs, &mut t1);
            sub_flat(&mut t1, &t0, product_limbs);
            sub_flat(&mut t1, &t2, product_limbs);

            for wide in [&t0, &t1, &t2] {
                polys.push(self.scale_by_plain_over_coeff(wide, product_limbs)?)?;
            }
        } else {
            let mut temp = vec![0u64; n * product_limbs];
            for dest_index in 0..dest_count {
                let mut acc = vec![0u64; n * product_limbs];
                for i in 0..s1.min(dest_index + 1) {
                    let j = match dest_index.checked_sub(i) {
                        Some(j) if j < s2 => j,
                        _ => continue,
                    };
                    nussbaumer_multiply_poly_poly(
                        &flat1[i],
                        &flat2[j],
                        k,
                        op_limbs,
                        product_limbs,
                        &mut temp,
                    );
                    add_flat_inplace(&mut acc, &temp, product_limbs);
                }
                polys.push(self.scale_by_plain_over_coeff(&acc, product_limbs)?)?;
            }
        }
        Ok(Ciphertext::new(params, polys, false))
    }

    // Size-2 squaring via the cross-multiply variant, sharing the forward
    // transforms between the three convolutions.
    fn nussbaumer_square(&self, encrypted: &Ciphertext) -> Result<Ciphertext> {
        let params = &self.params;
        let n = params.degree();
        let k = params.polymod.coeff_count_power();
        let limbs = params.coeff_uint64_count();
        let bits = params.coeff_bit_count();

        let op_limbs = limbs + 1;
        let product_bits = 2 * bits + k + 1 + 2;
        let product_limbs = div_ceil(product_bits, BITS_PER_U64);

        let c0 = widen_poly(&encrypted.polys[0], op_limbs);
        let c1 = widen_poly(&encrypted.polys[1], op_limbs);
        let mut aa = vec![0u64; n * product_limbs];
        let mut bb = vec![0u64; n * product_limbs];
        let mut ab = vec![0u64; n * product_limbs];
        nussbaumer_cross_multiply_poly_poly(
            &c0,
            &c1,
            k,
            op_limbs,
            product_limbs,
            &mut aa,
            &mut bb,
            &mut ab,
        );
        // Middle component is 2 * c0 * c1.
        let ab_clone = ab.clone();
        add_flat_inplace(&mut ab, &ab_clone, product_limbs);

        let mut polys = PolyArray::empty();
        for wide in [&aa, &ab, &bb] {
            polys.push(self.scale_by_plain_over_coeff(wide, product_limbs)?)?;
        }
        Ok(Ciphertext::new(params, polys, false))
    }

    // Ciphertext multiplication through the double NTT: dyadic sums mod q
    // and mod q', CRT recomposition into the exact integer sum, then the
    // t/q rounding with sign restoration.
    fn ntt_multiply(
        &self,
        encrypted1: &Ciphertext,
        encrypted2: &Ciphertext,
    ) -> Result<Ciphertext> {
        let params = &self.params;
        let n = params.degree();
        let bits = params.coeff_bit_count();
        let s1 = encrypted1.size();
        let s2 = encrypted2.size();
        let dest_count = s1 + s2 - 1;

        let tables = params.ntt_tables.as_ref().expect("qualifier checked");
        let aux_tables = params.aux_ntt_tables.as_ref().expect("qualifier checked");
        let aux_mod = params.aux_mod.as_ref().expect("qualifier checked");
        let crt = params.crt.as_ref().expect("qualifier checked");
        let aux_bits = aux_mod.significant_bit_count();

        // q q' must hold min(s1, s2) * n * q^2.
        let needed = 2 * bits
            + params.polymod.coeff_count_power()
            + ops::significant_bit_count_uint(&[s1.min(s2) as u64])
            + 1;
        if crt.mod_product_bit_count() < needed {
            return Err(Error::logic(
                "the auxiliary modulus is too small for ciphertexts of this size",
            ));
        }

        let transform = |polys: &PolyArray| -> (Vec<BigPoly>, Vec<BigPoly>) {
            let mut main = Vec::with_capacity(polys.size());
            let mut aux = Vec::with_capacity(polys.size());
            for p in polys.iter() {
                let mut main_copy = p.clone();
                ntt_negacyclic_harvey(main_copy.as_mut_slice(), tables);
                main.push(main_copy);
                // Residues are below q < q', so widening is reduction.
                let mut aux_copy = BigPoly::new(n, aux_bits);
                for c in 0..n {
                    ops::set_uint_uint(p.coeff(c), aux_copy.coeff_mut(c));
                }
                ntt_negacyclic_harvey(aux_copy.as_mut_slice(), aux_tables);
                aux.push(aux_copy);
            }
            (main, aux)
        };
        let (main1, aux1) = transform(&encrypted1.polys);
        let (main2, aux2) = transform(&encrypted2.polys);

        let compose_limbs = crt.mod_product_uint64_count();
        let mut polys = PolyArray::empty();
        let mut product = BigPoly::new(n, bits);
        let mut aux_product = BigPoly::new(n, aux_bits);
        for dest_index in 0..dest_count {
            let mut sum_main = BigPoly::new(n, bits);
            let mut sum_aux = BigPoly::new(n, aux_bits);
            for i in 0..s1.min(dest_index + 1) {
                let j = match dest_index.checked_sub(i) {
                    Some(j) if j < s2 => j,
                    _ => continue,
                };
                dyadic_product_coeffmod(&main1[i], &main2[j], &params.coeff_mod, &mut product)?;
                let acc = sum_main.clone();
                add_poly_poly_coeffmod(&acc, &product, &params.coeff_mod, &mut sum_main)?;
                dyadic_product_coeffmod(&aux1[i], &aux2[j], aux_mod, &mut aux_product)?;
                let acc = sum_aux.clone();
                add_poly_poly_coeffmod(&acc, &aux_product, aux_mod, &mut sum_aux)?;
            }
            inverse_ntt_negacyclic_harvey(sum_main.as_mut_slice(), tables);
            inverse_ntt_negacyclic_harvey(sum_aux.as_mut_slice(), aux_tables);

            // Compose the exact integer sum, flattening into the signed
            // wide layout the rounding step expects.
            let mut wide = vec![0u64; n * (compose_limbs + 1)];
            let mut composed = vec![0u64; compose_limbs];
            for c in 0..n {
                crt.compose(sum_main.coeff(c), sum_aux.coeff(c), &mut composed);
                let dst = &mut wide[c * (compose_limbs + 1)..(c + 1) * (compose_limbs + 1)];
                if ops::is_greater_than_or_equal_uint_uint(
                    &composed,
                    params.mod_product_upper_half_threshold.as_slice(),
                ) {
                    // Two's complement of q q' - x.
                    let mut magnitude = vec![0u64; compose_limbs];
                    ops::sub_uint_uint(crt.mod_product(), &composed, &mut magnitude);
                    ops::set_uint_uint(&magnitude, dst);
                    ops::negate_uint_inplace(dst);
                } else {
                    ops::set_uint_uint(&composed, dst);
                }
            }
            polys.push(self.scale_by_plain_over_coeff(&wide, compose_limbs + 1)?)?;
        }
        Ok(Ciphertext::new(params, polys, false))
    }

    // The shared rounding step of ciphertext multiplication: for each
    // signed wide coefficient, multiply the magnitude by t, add floor(q/2),
    // floor-divide by q, reduce mod q, and restore the sign.
    fn scale_by_plain_over_coeff(&self, wide: &[u64], wide_limbs: usize) -> Result<BigPoly> {
        let params = &self.params;
        let n = params.degree();
        let limbs = params.coeff_uint64_count();
        let bits = params.coeff_bit_count();
        let plain_limbs = params.plain_mod.uint64_count();
        let intermediate_limbs = wide_limbs + plain_limbs;

        let mut out = BigPoly::new(n, bits);
        let mut magnitude = vec![0u64; wide_limbs];
        let mut intermediate = vec![0u64; intermediate_limbs];
        let mut quotient = vec![0u64; intermediate_limbs];
        let mut q_wide = vec![0u64; intermediate_limbs];
        ops::set_uint_uint(params.coeff_mod.as_slice(), &mut q_wide);

        for c in 0..n {
            let coeff = &wide[c * wide_limbs..(c + 1) * wide_limbs];
            let negative = ops::is_high_bit_set_uint(coeff);
            ops::set_uint_uint(coeff, &mut magnitude);
            if negative {
                ops::negate_uint_inplace(&mut magnitude);
            }
            ops::multiply_uint_uint(
                &magnitude,
                params.plain_modulus().as_slice(),
                &mut intermediate,
            );
            ops::add_uint_uint_inplace(
                &mut intermediate,
                params.coeff_modulus_div_two.as_slice(),
            );
            ops::divide_uint_uint_inplace(&mut intermediate, &q_wide, &mut quotient);
            params.coeff_mod.modulo_uint_inplace(&mut quotient)?;
            let dst = out.coeff_mut(c);
            if negative {
                params.coeff_mod.negate_uint_mod(&quotient[..limbs], dst);
            } else {
                ops::set_uint_uint(&quotient[..limbs], dst);
            }
        }
        Ok(out)
    }
}

// Zero-extend each coefficient of a residue polynomial into a flat signed
// array of the given limb width.
fn widen_poly(poly: &BigPoly, limbs: usize) -> Vec<u64> {
    let n = poly.coeff_count();
    let mut out = vec![0u64; n * limbs];
    for i in 0..n {
        let src = poly.coeff(i);
        let copy = src.len().min(limbs);
        out[i * limbs..i * limbs + copy].copy_from_slice(&src[..copy]);
    }
    out
}

fn add_flat(a: &[u64], b: &[u64], limbs: usize) -> Vec<u64> {
    let mut out = a.to_vec();
    add_flat_inplace(&mut out, b, limbs);
    out
}

fn add_flat_inplace(a: &mut [u64], b: &[u64], limbs: usize) {
    izip!(a.chunks_mut(limbs), b.chunks(limbs))
        .for_each(|(ac, bc)| {
            ops::add_uint_uint_inplace(ac, bc);
        });
}

fn sub_flat(a: &mut [u64], b: &[u64], limbs: usize) {
    izip!(a.chunks_mut(limbs), b.chunks(limbs))
        .for_each(|(ac, bc)| {
            ops::sub_uint_uint_inplace(ac, bc);
        });
}
