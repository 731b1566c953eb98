//! Automatic parameter selection.
//!
//! A [`ChooserPoly`] records an upper bound on the plaintext it models and
//! the DAG of operations that produced it. The [`ChooserEvaluator`] builds
//! those DAGs with the same surface as the real evaluator and searches a
//! table of (n, q) candidates, together with the decomposition bit count,
//! for the smallest parameter set whose simulated noise still decrypts
//! with the requested spare budget.

use std::collections::BTreeMap;

use log::debug;

use fv_math::uint::BigUInt;

use crate::parameters::{FvParameters, FvParametersBuilder};
use crate::simulator::{Simulation, SimulationEvaluator};
use crate::{Error, Result};

/// Default standard deviation of the noise distribution.
pub const DEFAULT_NOISE_STANDARD_DEVIATION: f64 = 3.19;

/// Default clipping bound of the noise distribution.
pub const DEFAULT_NOISE_MAX_DEVIATION: f64 = 19.14;

/// The default table of (n, q) candidates: for each power-of-two degree a
/// coefficient modulus that is an NTT prime leaving room for the noise.
pub fn default_parameter_options() -> BTreeMap<usize, BigUInt> {
    let one = BigUInt::from(1u64);
    let pow2 = |e: usize| &one << e;
    let mut options = BTreeMap::new();
    options.insert(2048, &(&pow2(60) - &pow2(14)) + 1);
    options.insert(4096, &(&pow2(116) - &pow2(18)) + 1);
    options.insert(8192, &(&pow2(226) - &pow2(26)) + 1);
    options.insert(16384, &(&pow2(435) - &pow2(33)) + 1);
    options.insert(
        32768,
        &(&(&(&pow2(889) - &pow2(54)) - &pow2(53)) - &pow2(52)) + 1,
    );
    options
}

// The operation DAG; leaves are fresh encryptions, nodes mirror the
// evaluator operations. Simulation is a post-order traversal.
#[derive(Debug, Clone)]
enum Computation {
    Fresh {
        plain_max_coeff_count: usize,
        plain_max_abs_value: BigUInt,
    },
    Negate(Box<Computation>),
    Add(Box<Computation>, Box<Computation>),
    AddMany(Vec<Computation>),
    Sub(Box<Computation>, Box<Computation>),
    Multiply(Box<Computation>, Box<Computation>),
    MultiplyMany(Vec<Computation>),
    Square(Box<Computation>),
    Relinearize(Box<Computation>, usize),
    MultiplyPlain(Box<Computation>, usize, BigUInt),
    AddPlain(Box<Computation>, usize, BigUInt),
    SubPlain(Box<Computation>, usize, BigUInt),
    Exponentiate(Box<Computation>, u64),
}

impl Computation {
    fn simulate(&self, params: &FvParameters) -> Result<Simulation> {
        let evaluator = SimulationEvaluator::new();
        match self {
            Self::Fresh {
                plain_max_coeff_count,
                plain_max_abs_value,
            } => evaluator.get_fresh(params, *plain_max_coeff_count, plain_max_abs_value),
            Self::Negate(a) => evaluator.negate(&a.simulate(params)?),
            Self::Add(a, b) => evaluator.add(&a.simulate(params)?, &b.simulate(params)?),
            Self::AddMany(children) => {
                let sims: Result<Vec<_>> =
                    children.iter().map(|c| c.simulate(params)).collect();
                evaluator.add_many(&sims?)
            }
            Self::Sub(a, b) => evaluator.sub(&a.simulate(params)?, &b.simulate(params)?),
            Self::Multiply(a, b) => {
                evaluator.multiply(&a.simulate(params)?, &b.simulate(params)?)
            }
            Self::MultiplyMany(children) => {
                let sims: Result<Vec<_>> =
                    children.iter().map(|c| c.simulate(params)).collect();
                evaluator.multiply_many(&sims?)
            }
            Self::Square(a) => evaluator.square(&a.simulate(params)?),
            Self::Relinearize(a, size) => evaluator.relinearize(&a.simulate(params)?, *size),
            Self::MultiplyPlain(a, mc, ma) => {
                evaluator.multiply_plain(&a.simulate(params)?, *mc, ma)
            }
            Self::AddPlain(a, mc, ma) => evaluator.add_plain(&a.simulate(params)?, *mc, ma),
            Self::SubPlain(a, mc, ma) => evaluator.sub_plain(&a.simulate(params)?, *mc, ma),
            Self::Exponentiate(a, e) => evaluator.exponentiate(&a.simulate(params)?, *e),
        }
    }
}

/// Models one ciphertext during parameter selection: the worst-case shape
/// of the underlying plaintext and the operation history that produced it.
#[derive(Debug, Clone)]
pub struct ChooserPoly {
    max_coeff_count: usize,
    max_abs_value: BigUInt,
    comp: Option<Computation>,
}

impl ChooserPoly {
    /// A fresh encryption of a plaintext with at most `max_coeff_count`
    /// coefficients of magnitude at most `max_abs_value`.
    pub fn new(max_coeff_count: usize, max_abs_value: BigUInt) -> Result<Self> {
        if max_coeff_count == 0 {
            return Err(Error::invalid("max_coeff_count must be strictly positive"));
        }
        let max_coeff_count = if max_abs_value.is_zero() {
            1
        } else {
            max_coeff_count
        };
        Ok(Self {
            max_coeff_count,
            max_abs_value: max_abs_value.clone(),
            comp: Some(Computation::Fresh {
                plain_max_coeff_count: max_coeff_count,
                plain_max_abs_value: max_abs_value,
            }),
        })
    }

    /// The bound on the plaintext coefficient count.
    pub fn max_coeff_count(&self) -> usize {
        self.max_coeff_count
    }

    /// The bound on the plaintext coefficient magnitude.
    pub fn max_abs_value(&self) -> &BigUInt {
        &self.max_abs_value
    }

    /// Simulate the recorded operations under candidate parameters.
    pub fn simulate(&self, params: &FvParameters) -> Result<Simulation> {
        let comp = self
            .comp
            .as_ref()
            .ok_or_else(|| Error::logic("no operation history to simulate"))?;
        comp.simulate(params)
    }

    fn with(max_coeff_count: usize, max_abs_value: BigUInt, comp: Computation) -> Self {
        Self {
            max_coeff_count: if max_abs_value.is_zero() {
                1
            } else {
                max_coeff_count
            },
            max_abs_value,
            comp: Some(comp),
        }
    }

    fn comp(&self) -> Result<Computation> {
        self.comp
            .clone()
            .ok_or_else(|| Error::invalid("operand is not correctly initialized"))
    }
}

/// Builds [`ChooserPoly`] DAGs with the evaluator's surface and selects
/// parameters for them.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChooserEvaluator;

impl ChooserEvaluator {
    /// Creates a new chooser evaluator.
    pub fn new() -> Self {
        Self
    }

    /// Model negation.
    pub fn negate(&self, operand: &ChooserPoly) -> Result<ChooserPoly> {
        Ok(ChooserPoly::with(
            operand.max_coeff_count,
            operand.max_abs_value.clone(),
            Computation::Negate(Box::new(operand.comp()?)),
        ))
    }

    /// Model addition.
    pub fn add(&self, operand1: &ChooserPoly, operand2: &ChooserPoly) -> Result<ChooserPoly> {
        Ok(ChooserPoly::with(
            operand1.max_coeff_count.max(operand2.max_coeff_count),
            &operand1.max_abs_value + &operand2.max_abs_value,
            Computation::Add(Box::new(operand1.comp()?), Box::new(operand2.comp()?)),
        ))
    }

    /// Model addition of many operands.
    pub fn add_many(&self, operands: &[ChooserPoly]) -> Result<ChooserPoly> {
        if operands.is_empty() {
            return Err(Error::invalid("operands cannot be empty"));
        }
        let mut max_coeff_count = 0;
        let mut sum = BigUInt::zero();
        let mut comps = Vec::with_capacity(operands.len());
        for op in operands {
            max_coeff_count = max_coeff_count.max(op.max_coeff_count);
            sum = &sum + &op.max_abs_value;
            comps.push(op.comp()?);
        }
        Ok(ChooserPoly::with(
            max_coeff_count,
            sum,
            Computation::AddMany(comps),
        ))
    }

    /// Model subtraction.
    pub fn sub(&self, operand1: &ChooserPoly, operand2: &ChooserPoly) -> Result<ChooserPoly> {
        Ok(ChooserPoly::with(
            operand1.max_coeff_count.max(operand2.max_coeff_count),
            &operand1.max_abs_value + &operand2.max_abs_value,
            Computation::Sub(Box::new(operand1.comp()?), Box::new(operand2.comp()?)),
        ))
    }

    /// Model multiplication.
    pub fn multiply(
        &self,
        operand1: &ChooserPoly,
        operand2: &ChooserPoly,
    ) -> Result<ChooserPoly> {
        let comp =
            Computation::Multiply(Box::new(operand1.comp()?), Box::new(operand2.comp()?));
        if operand1.max_abs_value.is_zero() || operand2.max_abs_value.is_zero() {
            return Ok(ChooserPoly::with(1, BigUInt::zero(), comp));
        }
        let growth = operand1.max_coeff_count.min(operand2.max_coeff_count) as u64;
        let abs = &(&operand1.max_abs_value * &operand2.max_abs_value) * growth;
        Ok(ChooserPoly::with(
            operand1.max_coeff_count + operand2.max_coeff_count - 1,
            abs,
            comp,
        ))
    }

    /// Model squaring.
    pub fn square(&self, operand: &ChooserPoly) -> Result<ChooserPoly> {
        let comp = Computation::Square(Box::new(operand.comp()?));
        if operand.max_abs_value.is_zero() {
            return Ok(ChooserPoly::with(1, BigUInt::zero(), comp));
        }
        let growth = operand.max_coeff_count as u64;
        let abs = &(&operand.max_abs_value * &operand.max_abs_value) * growth;
        Ok(ChooserPoly::with(
            2 * operand.max_coeff_count - 1,
            abs,
            comp,
        ))
    }

    /// Model relinearization to `destination_size`.
    pub fn relinearize(
        &self,
        operand: &ChooserPoly,
        destination_size: usize,
    ) -> Result<ChooserPoly> {
        Ok(ChooserPoly::with(
            operand.max_coeff_count,
            operand.max_abs_value.clone(),
            Computation::Relinearize(Box::new(operand.comp()?), destination_size),
        ))
    }

    /// Model plaintext multiplication.
    pub fn multiply_plain(
        &self,
        operand: &ChooserPoly,
        plain_max_coeff_count: usize,
        plain_max_abs_value: &BigUInt,
    ) -> Result<ChooserPoly> {
        if plain_max_coeff_count == 0 {
            return Err(Error::invalid("plain_max_coeff_count must be positive"));
        }
        if plain_max_abs_value.is_zero() {
            return Err(Error::invalid("plain_max_abs_value cannot be zero"));
        }
        let comp = Computation::MultiplyPlain(
            Box::new(operand.comp()?),
            plain_max_coeff_count,
            plain_max_abs_value.clone(),
        );
        if operand.max_abs_value.is_zero() {
            return Ok(ChooserPoly::with(1, BigUInt::zero(), comp));
        }
        let growth = operand.max_coeff_count.min(plain_max_coeff_count) as u64;
        let abs = &(&operand.max_abs_value * plain_max_abs_value) * growth;
        Ok(ChooserPoly::with(
            operand.max_coeff_count + plain_max_coeff_count - 1,
            abs,
            comp,
        ))
    }

    /// Model plaintext addition.
    pub fn add_plain(
        &self,
        operand: &ChooserPoly,
        plain_max_coeff_count: usize,
        plain_max_abs_value: &BigUInt,
    ) -> Result<ChooserPoly> {
        if plain_max_coeff_count == 0 {
            return Err(Error::invalid("plain_max_coeff_count must be positive"));
        }
        let comp = Computation::AddPlain(
            Box::new(operand.comp()?),
            plain_max_coeff_count,
            plain_max_abs_value.clone(),
        );
        Ok(ChooserPoly::with(
            operand.max_coeff_count.max(plain_max_coeff_count),
            &operand.max_abs_value + plain_max_abs_value,
            comp,
        ))
    }

    /// Model plaintext subtraction.
    pub fn sub_plain(
        &self,
        operand: &ChooserPoly,
        plain_max_coeff_count: usize,
        plain_max_abs_value: &BigUInt,
    ) -> Result<ChooserPoly> {
        if plain_max_coeff_count == 0 {
            return Err(Error::invalid("plain_max_coeff_count must be positive"));
        }
        let comp = Computation::SubPlain(
            Box::new(operand.comp()?),
            plain_max_coeff_count,
            plain_max_abs_value.clone(),
        );
        Ok(ChooserPoly::with(
            operand.max_coeff_count.max(plain_max_coeff_count),
            &operand.max_abs_value + plain_max_abs_value,
            comp,
        ))
    }

    /// Model a product tree over many operands.
    pub fn multiply_many(&self, operands: &[ChooserPoly]) -> Result<ChooserPoly> {
        if operands.is_empty() {
            return Err(Error::invalid("operands cannot be empty"));
        }
        let mut prod_max_coeff_count = 1usize;
        let mut growth_factor = 1u64;
        let mut comps = Vec::with_capacity(operands.len());
        for (i, op) in operands.iter().enumerate() {
            if op.max_abs_value.is_zero() {
                return Ok(ChooserPoly::with(
                    1,
                    BigUInt::zero(),
                    Computation::MultiplyMany(
                        operands.iter().map(|o| o.comp()).collect::<Result<_>>()?,
                    ),
                ));
            }
            prod_max_coeff_count += op.max_coeff_count - 1;
            if i != 0 {
                growth_factor =
                    growth_factor.saturating_mul(op.max_coeff_count.min(prod_max_coeff_count) as u64);
            }
            comps.push(op.comp()?);
        }
        let mut abs = BigUInt::from(growth_factor);
        for op in operands {
            abs = &abs * &op.max_abs_value;
        }
        Ok(ChooserPoly::with(
            prod_max_coeff_count,
            abs,
            Computation::MultiplyMany(comps),
        ))
    }

    /// Model exponentiation.
    pub fn exponentiate(&self, operand: &ChooserPoly, exponent: u64) -> Result<ChooserPoly> {
        if exponent == 0 {
            return Err(Error::invalid("exponent cannot be zero"));
        }
        let comp = Computation::Exponentiate(Box::new(operand.comp()?), exponent);
        if operand.max_abs_value.is_zero() {
            return Ok(ChooserPoly::with(1, BigUInt::zero(), comp));
        }
        // No closed formula for the growth factor; use the asymptotic
        // approximation k^e * sqrt(6 / ((k - 1)(k + 1) pi e)).
        let k = operand.max_coeff_count;
        let growth_factor = if k == 1 {
            1u64
        } else {
            ((k as f64).powi(exponent as i32)
                * (6.0 / (((k - 1) * (k + 1)) as f64 * std::f64::consts::PI * exponent as f64))
                    .sqrt()) as u64
        };
        let abs = &operand.max_abs_value.pow_u64(exponent) * growth_factor.max(1);
        Ok(ChooserPoly::with(
            (exponent as usize) * (k - 1) + 1,
            abs,
            comp,
        ))
    }

    /// Search the candidate table for the smallest parameter set that
    /// evaluates every operand's history with at least `budget_gap` bits
    /// of invariant noise budget to spare, searching the decomposition bit
    /// count as well. Returns `None` when no candidate succeeds.
    pub fn select_parameters(
        &self,
        operands: &[ChooserPoly],
        budget_gap: usize,
        noise_standard_deviation: f64,
        noise_max_deviation: f64,
        parameter_options: &BTreeMap<usize, BigUInt>,
    ) -> Result<Option<FvParameters>> {
        if noise_standard_deviation < 0.0 || noise_max_deviation < 0.0 {
            return Err(Error::invalid("noise deviations cannot be negative"));
        }
        if parameter_options.is_empty() {
            return Err(Error::invalid(
                "parameter_options must contain at least one entry",
            ));
        }
        if operands.is_empty() {
            return Err(Error::invalid("operands cannot be empty"));
        }

        let mut largest_bit_count = 0;
        let mut largest_coeff_count = 0;
        for op in operands {
            if op.comp.is_none() {
                return Err(Error::logic("no operation history to simulate"));
            }
            largest_bit_count = largest_bit_count.max(op.max_abs_value.significant_bit_count());
            largest_coeff_count = largest_coeff_count.max(op.max_coeff_count);
        }

        // The plaintext modulus is the smallest power of two above the
        // largest coefficient that can appear.
        let mut plain_modulus = BigUInt::from(1u64);
        plain_modulus <<= largest_bit_count.max(1);

        for (&degree, coeff_modulus) in parameter_options {
            if degree < 512 || !degree.is_power_of_two() {
                return Err(Error::invalid("parameter_options keys invalid"));
            }
            if degree <= largest_coeff_count || plain_modulus >= *coeff_modulus {
                continue;
            }

            let coeff_bits = coeff_modulus.significant_bit_count();
            let mut builder = FvParametersBuilder::new();
            builder
                .set_poly_modulus_degree(degree)?
                .set_coeff_modulus(coeff_modulus)?
                .set_plain_modulus(&plain_modulus)?
                .set_noise_standard_deviation(noise_standard_deviation)?
                .set_noise_max_deviation(noise_max_deviation)?;

            // Start from the maximum decomposition bit count: if that
            // already works, the history used no relinearization and the
            // final parameters carry w = 0 to record it.
            builder.set_decomposition_bit_count(coeff_bits)?;
            if self.all_decrypt(operands, &builder, budget_gap)? {
                builder.set_decomposition_bit_count(0)?;
                debug!("selected degree {degree} without relinearization");
                return Ok(Some(builder.build()?));
            }

            // Otherwise search w downwards. Too small a w slows
            // multiplication, so stop at a tenth of the modulus width.
            let min_bit_count = ((coeff_bits + 9) / 10).max(1);
            let mut bit_count = coeff_bits;
            while bit_count > min_bit_count {
                bit_count -= 1;
                builder.set_decomposition_bit_count(bit_count)?;
                if self.all_decrypt(operands, &builder, budget_gap)? {
                    // Shrink w further as long as the decomposition length
                    // stays the same, which keeps performance unchanged.
                    let parts = (coeff_bits + bit_count - 1) / bit_count;
                    let refined = (coeff_bits + parts - 1) / parts;
                    builder.set_decomposition_bit_count(refined)?;
                    debug!("selected degree {degree} with decomposition bit count {refined}");
                    return Ok(Some(builder.build()?));
                }
            }
        }
        Ok(None)
    }

    /// [`Self::select_parameters`] with the default noise configuration
    /// and candidate table.
    pub fn select_parameters_default(
        &self,
        operands: &[ChooserPoly],
        budget_gap: usize,
    ) -> Result<Option<FvParameters>> {
        self.select_parameters(
            operands,
            budget_gap,
            DEFAULT_NOISE_STANDARD_DEVIATION,
            DEFAULT_NOISE_MAX_DEVIATION,
            &default_parameter_options(),
        )
    }

    fn all_decrypt(
        &self,
        operands: &[ChooserPoly],
        builder: &FvParametersBuilder,
        budget_gap: usize,
    ) -> Result<bool> {
        let trial = builder.build_unvalidated()?;
        for op in operands {
            if !op.simulate(&trial)?.decrypts(budget_gap) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Models the integer encoder during parameter selection: a base-2
/// encoding of a value has one {0, 1} coefficient per significant bit.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChooserEncoder;

impl ChooserEncoder {
    /// Creates a new chooser encoder.
    pub fn new() -> Self {
        Self
    }

    /// Model encoding an integer.
    pub fn encode(&self, value: u64) -> Result<ChooserPoly> {
        let bits = (64 - value.leading_zeros()) as usize;
        ChooserPoly::new(
            bits.max(1),
            if value == 0 {
                BigUInt::zero()
            } else {
                BigUInt::from(1u64)
            },
        )
    }
}

/// Models encryption during parameter selection: a fresh history over the
/// plaintext bounds.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChooserEncryptor;

impl ChooserEncryptor {
    /// Creates a new chooser encryptor.
    pub fn new() -> Self {
        Self
    }

    /// Model encrypting a modeled plaintext.
    pub fn encrypt(&self, plain: &ChooserPoly) -> Result<ChooserPoly> {
        ChooserPoly::new(plain.max_coeff_count, plain.max_abs_value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        default_parameter_options, ChooserEncoder, ChooserEncryptor, ChooserEvaluator,
        ChooserPoly, DEFAULT_NOISE_MAX_DEVIATION, DEFAULT_NOISE_STANDARD_DEVIATION,
    };
    use fv_math::uint::BigUInt;

    #[test]
    fn test_default_table_shape() {
        let options = default_parameter_options();
        assert_eq!(options.len(), 5);
        assert_eq!(options[&2048].significant_bit_count(), 60);
        assert_eq!(options[&4096].significant_bit_count(), 116);
        assert_eq!(options[&8192].significant_bit_count(), 226);
        assert_eq!(options[&16384].significant_bit_count(), 435);
        assert_eq!(options[&32768].significant_bit_count(), 889);
    }

    #[test]
    fn test_bound_tracking() {
        let evaluator = ChooserEvaluator::new();
        let a = ChooserPoly::new(3, BigUInt::from(7)).unwrap();
        let b = ChooserPoly::new(2, BigUInt::from(5)).unwrap();

        let sum = evaluator.add(&a, &b).unwrap();
        assert_eq!(sum.max_coeff_count(), 3);
        assert_eq!(*sum.max_abs_value(), BigUInt::from(12));

        let product = evaluator.multiply(&a, &b).unwrap();
        assert_eq!(product.max_coeff_count(), 4);
        // min(3, 2) * 7 * 5
        assert_eq!(*product.max_abs_value(), BigUInt::from(70));

        let square = evaluator.square(&a).unwrap();
        assert_eq!(square.max_coeff_count(), 5);
        assert_eq!(*square.max_abs_value(), BigUInt::from(3 * 49));

        let scaled = evaluator
            .multiply_plain(&a, 2, &BigUInt::from(3))
            .unwrap();
        assert_eq!(scaled.max_coeff_count(), 4);
        assert_eq!(*scaled.max_abs_value(), BigUInt::from(2 * 21));
    }

    #[test]
    fn test_select_parameters_simple_circuit() {
        let _ = env_logger::builder().is_test(true).try_init();
        let evaluator = ChooserEvaluator::new();
        let encoder = ChooserEncoder::new();
        let encryptor = ChooserEncryptor::new();

        let x = encryptor.encrypt(&encoder.encode(12345).unwrap()).unwrap();
        let y = encryptor.encrypt(&encoder.encode(54321).unwrap()).unwrap();
        let sum = evaluator.add(&x, &y).unwrap();

        let selected = evaluator
            .select_parameters_default(&[sum], 10)
            .unwrap()
            .expect("an additive circuit fits the smallest candidate");
        assert_eq!(selected.degree(), 2048);
        assert_eq!(selected.decomposition_bit_count(), 0);
        assert_eq!(
            selected.noise_standard_deviation(),
            DEFAULT_NOISE_STANDARD_DEVIATION
        );
        assert_eq!(selected.noise_max_deviation(), DEFAULT_NOISE_MAX_DEVIATION);
    }

    #[test]
    fn test_select_parameters_squaring_circuit() {
        let evaluator = ChooserEvaluator::new();
        let fresh = ChooserPoly::new(1, BigUInt::from(2)).unwrap();
        let squared = evaluator.square(&evaluator.square(&fresh).unwrap()).unwrap();

        let selected = evaluator
            .select_parameters_default(&[squared], 10)
            .unwrap()
            .expect("the squaring circuit fits the default table");
        // Two squarings without relinearization push past the 60-bit
        // modulus; the 116-bit candidate is the first that fits.
        assert_eq!(selected.degree(), 4096);
    }

    #[test]
    fn test_select_parameters_with_relinearization() {
        let evaluator = ChooserEvaluator::new();
        let fresh = ChooserPoly::new(1, BigUInt::from(2)).unwrap();
        let product = evaluator.multiply(&fresh, &fresh).unwrap();
        let relinearized = evaluator.relinearize(&product, 2).unwrap();
        let deep = evaluator
            .relinearize(&evaluator.square(&relinearized).unwrap(), 2)
            .unwrap();

        let selected = evaluator
            .select_parameters_default(&[deep], 10)
            .unwrap()
            .expect("the relinearized circuit fits the default table");
        assert!(selected.decomposition_bit_count() > 0);
    }

    #[test]
    fn test_select_parameters_monotonicity() {
        // If a gap succeeds, any smaller gap succeeds with a degree no
        // larger.
        let evaluator = ChooserEvaluator::new();
        let fresh = ChooserPoly::new(1, BigUInt::from(2)).unwrap();
        let squared = evaluator.square(&evaluator.square(&fresh).unwrap()).unwrap();

        let at_gap = evaluator
            .select_parameters_default(&[squared.clone()], 10)
            .unwrap()
            .unwrap();
        for gap in [0usize, 2, 5, 9] {
            let smaller = evaluator
                .select_parameters_default(&[squared.clone()], gap)
                .unwrap()
                .unwrap();
            assert!(smaller.degree() <= at_gap.degree());
        }
    }

    #[test]
    fn test_select_parameters_rejects_bad_inputs() {
        let evaluator = ChooserEvaluator::new();
        let fresh = ChooserPoly::new(1, BigUInt::from(2)).unwrap();
        assert!(evaluator
            .select_parameters(
                &[fresh.clone()],
                0,
                -1.0,
                DEFAULT_NOISE_MAX_DEVIATION,
                &default_parameter_options()
            )
            .is_err());
        assert!(evaluator
            .select_parameters(
                &[],
                0,
                DEFAULT_NOISE_STANDARD_DEVIATION,
                DEFAULT_NOISE_MAX_DEVIATION,
                &default_parameter_options()
            )
            .is_err());

        let mut bad_table = std::collections::BTreeMap::new();
        bad_table.insert(100usize, BigUInt::from(65537));
        assert!(evaluator
            .select_parameters(
                &[fresh],
                0,
                DEFAULT_NOISE_STANDARD_DEVIATION,
                DEFAULT_NOISE_MAX_DEVIATION,
                &bad_table
            )
            .is_err());
    }
}
