//! Encryption parameters for the FV scheme.

use std::fmt;
use std::sync::Arc;

use sha3::{Digest, Sha3_256};

use fv_math::crt::CrtComposer;
use fv_math::ntt::NttTables;
use fv_math::rq::{BigPoly, PolyModulus};
use fv_math::serialize::{
    read_big_poly, read_big_uint, write_f64, write_i32, ByteReader,
};
use fv_math::uint::ops;
use fv_math::uint::BigUInt;
use fv_math::zq::Modulus;
use fv_traits::{Deserialize, RandomGenerator, RandomGeneratorFactory, Serialize};
use fv_util::default_random_generator_factory;

use crate::{Error, Result};

/// Properties of a parameter set, computed once at construction and frozen
/// together with the parameter hash. They select the multiplication
/// back-end for every subsequent operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncryptionParameterQualifiers {
    /// The parameters support some evaluation path and may be used.
    pub parameters_set: bool,

    /// q admits a primitive 2n-th root of unity, so key material and
    /// encryption use the NTT.
    pub enable_ntt: bool,

    /// An auxiliary modulus q' is available, so ciphertext multiplication
    /// runs in the double-NTT domain with CRT recomposition.
    pub enable_ntt_in_multiply: bool,

    /// The polynomial modulus is 1·x^n + 1, so the Nussbaumer convolution
    /// is available.
    pub enable_nussbaumer: bool,
}

/// Builder for [`FvParameters`].
///
/// Every setter revalidates nothing; all validation and derivation happens
/// in [`FvParametersBuilder::build`].
#[derive(Clone, Default)]
pub struct FvParametersBuilder {
    poly_modulus: Option<BigPoly>,
    coeff_modulus: Option<BigUInt>,
    aux_coeff_modulus: Option<BigUInt>,
    plain_modulus: Option<BigUInt>,
    noise_standard_deviation: Option<f64>,
    noise_max_deviation: Option<f64>,
    decomposition_bit_count: usize,
    random_generator: Option<Arc<dyn RandomGeneratorFactory>>,
}

impl FvParametersBuilder {
    /// Creates a new instance of the builder.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the polynomial modulus. It must be monic of power-of-two
    /// degree; the canonical choice is 1·x^n + 1.
    pub fn set_poly_modulus(&mut self, poly_modulus: &BigPoly) -> Result<&mut Self> {
        // Errors on a malformed modulus surface here rather than in build().
        PolyModulus::new(poly_modulus)?;
        self.poly_modulus = Some(poly_modulus.clone());
        Ok(self)
    }

    /// Sets the polynomial modulus to 1·x^n + 1.
    pub fn set_poly_modulus_degree(&mut self, degree: usize) -> Result<&mut Self> {
        let pm = PolyModulus::one_zero_one(degree)?;
        self.poly_modulus = Some(pm.poly().clone());
        Ok(self)
    }

    /// Sets the coefficient modulus q.
    pub fn set_coeff_modulus(&mut self, coeff_modulus: &BigUInt) -> Result<&mut Self> {
        if coeff_modulus.significant_bit_count() < 2 {
            return Err(Error::invalid("coeff_modulus must be at least 2"));
        }
        self.coeff_modulus = Some(coeff_modulus.clone());
        Ok(self)
    }

    /// Sets the auxiliary coefficient modulus q' used by the NTT
    /// realization of ciphertext multiplication.
    pub fn set_aux_coeff_modulus(&mut self, aux: &BigUInt) -> Result<&mut Self> {
        if aux.significant_bit_count() < 2 {
            return Err(Error::invalid("aux_coeff_modulus must be at least 2"));
        }
        self.aux_coeff_modulus = Some(aux.clone());
        Ok(self)
    }

    /// Sets the plaintext modulus t.
    pub fn set_plain_modulus(&mut self, plain_modulus: &BigUInt) -> Result<&mut Self> {
        if plain_modulus.significant_bit_count() < 2 {
            return Err(Error::invalid("plain_modulus must be at least 2"));
        }
        self.plain_modulus = Some(plain_modulus.clone());
        Ok(self)
    }

    /// Sets the plaintext modulus t from a `u64`.
    pub fn set_plain_modulus_u64(&mut self, plain_modulus: u64) -> Result<&mut Self> {
        self.set_plain_modulus(&BigUInt::from(plain_modulus))
    }

    /// Sets the standard deviation of the noise distribution.
    pub fn set_noise_standard_deviation(&mut self, sigma: f64) -> Result<&mut Self> {
        if !sigma.is_finite() || sigma < 0.0 {
            return Err(Error::invalid(
                "noise_standard_deviation must be non-negative",
            ));
        }
        self.noise_standard_deviation = Some(sigma);
        Ok(self)
    }

    /// Sets the clipping bound of the noise distribution.
    pub fn set_noise_max_deviation(&mut self, bound: f64) -> Result<&mut Self> {
        if !bound.is_finite() || bound < 0.0 {
            return Err(Error::invalid("noise_max_deviation must be non-negative"));
        }
        self.noise_max_deviation = Some(bound);
        Ok(self)
    }

    /// Sets the decomposition bit count w used by relinearization.
    pub fn set_decomposition_bit_count(&mut self, count: usize) -> Result<&mut Self> {
        self.decomposition_bit_count = count;
        Ok(self)
    }

    /// Sets the random generator factory; the process-wide default is used
    /// otherwise.
    pub fn set_random_generator(
        &mut self,
        factory: Arc<dyn RandomGeneratorFactory>,
    ) -> &mut Self {
        self.random_generator = Some(factory);
        self
    }

    /// Validate the configuration, compute the qualifier vector and the
    /// derived helper values, and freeze the result.
    pub fn build(&self) -> Result<FvParameters> {
        let mut params = self.build_unvalidated()?;
        params.compute_qualifiers()?;
        if !params.qualifiers.parameters_set {
            return Err(Error::logic(
                "parameters support neither the NTT nor the Nussbaumer multiplication path",
            ));
        }
        Ok(params)
    }

    /// Like [`Self::build`], but wraps the result in an [`Arc`].
    pub fn build_arc(&self) -> Result<Arc<FvParameters>> {
        Ok(Arc::new(self.build()?))
    }

    // Builds the value-level parameter set without the qualifier vector or
    // any tables; the chooser simulates against these cheaply.
    pub(crate) fn build_unvalidated(&self) -> Result<FvParameters> {
        let poly_modulus = self
            .poly_modulus
            .clone()
            .ok_or_else(|| Error::invalid("unspecified poly_modulus"))?;
        let coeff_modulus = self
            .coeff_modulus
            .clone()
            .ok_or_else(|| Error::invalid("unspecified coeff_modulus"))?;
        let plain_modulus = self
            .plain_modulus
            .clone()
            .ok_or_else(|| Error::invalid("unspecified plain_modulus"))?;

        if plain_modulus >= coeff_modulus {
            return Err(Error::invalid(
                "plain_modulus must be smaller than coeff_modulus",
            ));
        }
        let decomposition_bit_count = self.decomposition_bit_count;
        if decomposition_bit_count > coeff_modulus.significant_bit_count() {
            return Err(Error::invalid(
                "decomposition_bit_count exceeds the coeff_modulus width",
            ));
        }

        let polymod = PolyModulus::new(&poly_modulus)?;
        let coeff_mod = Modulus::from_big_uint(&coeff_modulus)?;
        let plain_mod = Modulus::from_big_uint(&plain_modulus)?;

        // q and t must be coprime for the invariant-noise accounting.
        let limbs = coeff_mod.uint64_count();
        let mut t_wide = vec![0u64; limbs.max(plain_mod.uint64_count())];
        ops::set_uint_uint(plain_modulus.as_slice(), &mut t_wide);
        let mut inv = vec![0u64; limbs];
        if !coeff_mod.try_invert_uint_mod(&t_wide[..limbs], &mut inv) {
            return Err(Error::invalid("plain_modulus and coeff_modulus must be coprime"));
        }

        // Delta = floor(q / t) and r_t(q) = q mod t.
        let bits = coeff_mod.significant_bit_count();
        let mut numerator = vec![0u64; limbs];
        ops::set_uint_uint(coeff_modulus.as_slice(), &mut numerator);
        let mut quotient = vec![0u64; limbs];
        ops::divide_uint_uint_inplace(&mut numerator, &t_wide[..limbs], &mut quotient);
        let mut coeff_div_plain_modulus = BigUInt::new(bits);
        ops::set_uint_uint(&quotient, coeff_div_plain_modulus.as_mut_slice());
        let mut upper_half_increment = BigUInt::new(bits);
        ops::set_uint_uint(&numerator, upper_half_increment.as_mut_slice());

        // ((t + 1) / 2) * Delta marks the start of the upper half.
        let mut plain_upper_half_threshold = BigUInt::new(bits);
        ops::half_round_up_uint(&t_wide[..limbs], plain_upper_half_threshold.as_mut_slice());
        let mut upper_half_threshold = BigUInt::new(bits);
        ops::multiply_truncate_uint_uint(
            plain_upper_half_threshold.as_slice(),
            coeff_div_plain_modulus.as_slice(),
            upper_half_threshold.as_mut_slice(),
        );

        let plain_upper_half_increment = &coeff_modulus - &plain_modulus;
        let coeff_modulus_div_two = &coeff_modulus >> 1;

        let sigma = self
            .noise_standard_deviation
            .unwrap_or(crate::chooser::DEFAULT_NOISE_STANDARD_DEVIATION);
        let max_deviation = self
            .noise_max_deviation
            .unwrap_or(crate::chooser::DEFAULT_NOISE_MAX_DEVIATION);

        let mut params = FvParameters {
            poly_modulus,
            coeff_modulus,
            aux_coeff_modulus: self.aux_coeff_modulus.clone(),
            plain_modulus,
            noise_standard_deviation: sigma,
            noise_max_deviation: max_deviation,
            decomposition_bit_count,
            random_generator: self.random_generator.clone(),
            hash_block: [0u8; 32],
            qualifiers: EncryptionParameterQualifiers::default(),
            polymod,
            coeff_mod,
            aux_mod: None,
            plain_mod,
            ntt_tables: None,
            aux_ntt_tables: None,
            crt: None,
            coeff_div_plain_modulus,
            upper_half_threshold,
            upper_half_increment,
            plain_upper_half_threshold,
            plain_upper_half_increment,
            coeff_modulus_div_two,
            mod_product_upper_half_threshold: BigUInt::zero(),
        };
        params.compute_hash();
        Ok(params)
    }
}

impl fmt::Debug for FvParametersBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FvParametersBuilder")
            .field("poly_modulus", &self.poly_modulus)
            .field("coeff_modulus", &self.coeff_modulus)
            .field("aux_coeff_modulus", &self.aux_coeff_modulus)
            .field("plain_modulus", &self.plain_modulus)
            .field("noise_standard_deviation", &self.noise_standard_deviation)
            .field("noise_max_deviation", &self.noise_max_deviation)
            .field("decomposition_bit_count", &self.decomposition_bit_count)
            .finish_non_exhaustive()
    }
}

/// An immutable, validated FV parameter set.
///
/// Carries the raw configuration (n, q, q', t, sigma, B, w), the qualifier
/// vector, the derived helper constants, the NTT tables and CRT composer
/// when enabled, and a stable 256-bit hash over the canonical encoding of
/// the configuration. Equality is hash equality.
#[derive(Clone)]
pub struct FvParameters {
    poly_modulus: BigPoly,
    coeff_modulus: BigUInt,
    aux_coeff_modulus: Option<BigUInt>,
    plain_modulus: BigUInt,
    noise_standard_deviation: f64,
    noise_max_deviation: f64,
    decomposition_bit_count: usize,
    random_generator: Option<Arc<dyn RandomGeneratorFactory>>,
    hash_block: [u8; 32],

    qualifiers: EncryptionParameterQualifiers,
    pub(crate) polymod: PolyModulus,
    pub(crate) coeff_mod: Modulus,
    pub(crate) aux_mod: Option<Modulus>,
    pub(crate) plain_mod: Modulus,
    pub(crate) ntt_tables: Option<NttTables>,
    pub(crate) aux_ntt_tables: Option<NttTables>,
    pub(crate) crt: Option<CrtComposer>,

    // Delta = floor(q / t)
    pub(crate) coeff_div_plain_modulus: BigUInt,
    // ((t + 1) / 2) * Delta
    pub(crate) upper_half_threshold: BigUInt,
    // q mod t
    pub(crate) upper_half_increment: BigUInt,
    // (t + 1) / 2
    pub(crate) plain_upper_half_threshold: BigUInt,
    // q - t
    pub(crate) plain_upper_half_increment: BigUInt,
    // floor(q / 2)
    pub(crate) coeff_modulus_div_two: BigUInt,
    // ceil(q * q' / 2) when the CRT composer exists
    pub(crate) mod_product_upper_half_threshold: BigUInt,
}

impl FvParameters {
    /// The polynomial modulus x^n + 1.
    pub fn poly_modulus(&self) -> &BigPoly {
        &self.poly_modulus
    }

    /// The degree n of the polynomial modulus.
    pub fn degree(&self) -> usize {
        self.polymod.degree()
    }

    /// The coefficient modulus q.
    pub fn coeff_modulus(&self) -> &BigUInt {
        &self.coeff_modulus
    }

    /// The auxiliary coefficient modulus q', when configured.
    pub fn aux_coeff_modulus(&self) -> Option<&BigUInt> {
        self.aux_coeff_modulus.as_ref()
    }

    /// The plaintext modulus t.
    pub fn plain_modulus(&self) -> &BigUInt {
        &self.plain_modulus
    }

    /// The standard deviation of the noise distribution.
    pub fn noise_standard_deviation(&self) -> f64 {
        self.noise_standard_deviation
    }

    /// The clipping bound of the noise distribution.
    pub fn noise_max_deviation(&self) -> f64 {
        self.noise_max_deviation
    }

    /// The decomposition bit count w.
    pub fn decomposition_bit_count(&self) -> usize {
        self.decomposition_bit_count
    }

    /// The qualifier vector computed at construction.
    pub fn qualifiers(&self) -> &EncryptionParameterQualifiers {
        &self.qualifiers
    }

    /// The SHA3-256 hash over the canonical encoding of the parameters.
    pub fn hash_block(&self) -> &[u8; 32] {
        &self.hash_block
    }

    /// A fresh random generator from the configured factory, or from the
    /// process-wide default.
    pub fn create_random_generator(&self) -> Box<dyn RandomGenerator> {
        match &self.random_generator {
            Some(factory) => factory.create(),
            None => default_random_generator_factory().create(),
        }
    }

    pub(crate) fn coeff_uint64_count(&self) -> usize {
        self.coeff_mod.uint64_count()
    }

    pub(crate) fn coeff_bit_count(&self) -> usize {
        self.coeff_mod.significant_bit_count()
    }

    fn compute_qualifiers(&mut self) -> Result<()> {
        let mut rng = self.create_random_generator();

        self.qualifiers.enable_nussbaumer = self.polymod.is_one_zero_one();

        // The NTT needs a prime q with a primitive 2n-th root and two bits
        // of limb headroom for the lazy butterflies.
        if probably_prime(&self.coeff_modulus) {
            self.ntt_tables =
                NttTables::new(self.polymod.coeff_count_power(), &self.coeff_mod, &mut rng);
            self.qualifiers.enable_ntt = self.ntt_tables.is_some();
        }

        if self.qualifiers.enable_ntt {
            if let Some(aux) = &self.aux_coeff_modulus {
                // q' must carry its own 2n-th root, be coprime to q, and be
                // wide enough that q * q' > 4 n q^2.
                let wide_enough = aux.significant_bit_count()
                    >= self.coeff_modulus.significant_bit_count()
                        + self.polymod.coeff_count_power()
                        + 3;
                if wide_enough && probably_prime(aux) {
                    let aux_mod = Modulus::from_big_uint(aux)?;
                    let aux_tables =
                        NttTables::new(self.polymod.coeff_count_power(), &aux_mod, &mut rng);
                    if let Some(aux_tables) = aux_tables {
                        if let Ok(crt) = CrtComposer::generate(&self.coeff_mod, &aux_mod) {
                            let mut threshold = BigUInt::new(crt.mod_product_bit_count());
                            ops::half_round_up_uint(
                                crt.mod_product(),
                                threshold.as_mut_slice(),
                            );
                            self.mod_product_upper_half_threshold = threshold;
                            self.aux_mod = Some(aux_mod);
                            self.aux_ntt_tables = Some(aux_tables);
                            self.crt = Some(crt);
                            self.qualifiers.enable_ntt_in_multiply = true;
                        }
                    }
                }
            }
        }

        self.qualifiers.parameters_set =
            self.qualifiers.enable_ntt_in_multiply || self.qualifiers.enable_nussbaumer;
        Ok(())
    }

    // The hash covers the canonical words of the configuration: the
    // polynomial modulus limbs, q, t, the bit patterns of sigma and B, and
    // w. The auxiliary modulus only selects the multiplication path and is
    // excluded.
    fn compute_hash(&mut self) {
        let mut words: Vec<u64> = Vec::new();
        for i in 0..self.poly_modulus.coeff_count() {
            words.extend_from_slice(self.poly_modulus.coeff(i));
        }
        words.extend_from_slice(self.coeff_modulus.as_slice());
        words.extend_from_slice(self.plain_modulus.as_slice());
        words.push(self.noise_standard_deviation.to_bits());
        words.push(self.noise_max_deviation.to_bits());
        words.push(self.decomposition_bit_count as u64);

        let mut hasher = Sha3_256::new();
        for w in words {
            hasher.update(w.to_le_bytes());
        }
        self.hash_block = hasher.finalize().into();
    }
}

impl fmt::Debug for FvParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FvParameters")
            .field("degree", &self.degree())
            .field("coeff_modulus", &self.coeff_modulus)
            .field("aux_coeff_modulus", &self.aux_coeff_modulus)
            .field("plain_modulus", &self.plain_modulus)
            .field("noise_standard_deviation", &self.noise_standard_deviation)
            .field("noise_max_deviation", &self.noise_max_deviation)
            .field("decomposition_bit_count", &self.decomposition_bit_count)
            .field("qualifiers", &self.qualifiers)
            .finish_non_exhaustive()
    }
}

impl PartialEq for FvParameters {
    fn eq(&self, other: &Self) -> bool {
        self.hash_block == other.hash_block
    }
}

impl Eq for FvParameters {}

impl Serialize for FvParameters {
    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.poly_modulus.to_bytes());
        out.extend_from_slice(&self.coeff_modulus.to_bytes());
        let aux = self.aux_coeff_modulus.clone().unwrap_or_else(BigUInt::zero);
        out.extend_from_slice(&aux.to_bytes());
        out.extend_from_slice(&self.plain_modulus.to_bytes());
        write_f64(&mut out, self.noise_standard_deviation);
        write_f64(&mut out, self.noise_max_deviation);
        write_i32(&mut out, self.decomposition_bit_count);
        out
    }
}

impl Deserialize for FvParameters {
    type Error = Error;

    /// Rebuilds the parameters from the wire form; the hash and all
    /// derived values are recomputed, never transmitted.
    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let poly_modulus = read_big_poly(&mut reader)?;
        let coeff_modulus = read_big_uint(&mut reader)?;
        let aux = read_big_uint(&mut reader)?;
        let plain_modulus = read_big_uint(&mut reader)?;
        let sigma = reader.read_f64()?;
        let max_deviation = reader.read_f64()?;
        let decomposition_bit_count = reader.read_i32()?;
        if reader.remaining() != 0 {
            return Err(Error::Serialization("trailing bytes".to_string()));
        }

        let mut builder = FvParametersBuilder::new();
        builder
            .set_poly_modulus(&poly_modulus)?
            .set_coeff_modulus(&coeff_modulus)?
            .set_plain_modulus(&plain_modulus)?
            .set_noise_standard_deviation(sigma)?
            .set_noise_max_deviation(max_deviation)?
            .set_decomposition_bit_count(decomposition_bit_count)?;
        if !aux.is_zero() {
            builder.set_aux_coeff_modulus(&aux)?;
        }
        builder.build()
    }
}

fn probably_prime(value: &BigUInt) -> bool {
    fv_util::is_prime_bytes_le(&value.to_biguint().to_bytes_le())
}
