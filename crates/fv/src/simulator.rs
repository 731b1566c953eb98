//! Noise-growth simulation for the FV scheme.
//!
//! A [`Simulation`] models the invariant noise of one ciphertext as a
//! multi-precision upper bound scaled by q, together with the ciphertext
//! size and a snapshot of the parameters. The [`SimulationEvaluator`]
//! mirrors the evaluator operations on these bounds; any bound exceeding
//! floor(q/2) is clamped there, marking the ciphertext dead.

use fv_math::uint::BigUInt;

use crate::parameters::FvParameters;
use crate::{Error, Result};

/// A simulated ciphertext: an upper bound on the invariant noise (scaled
/// by q), the ciphertext size, and the parameter snapshot it was computed
/// under.
#[derive(Debug, Clone, PartialEq)]
pub struct Simulation {
    pub(crate) noise: BigUInt,
    pub(crate) coeff_modulus: BigUInt,
    pub(crate) plain_modulus: BigUInt,
    pub(crate) poly_modulus_degree: usize,
    pub(crate) noise_standard_deviation: f64,
    pub(crate) noise_max_deviation: f64,
    pub(crate) decomposition_bit_count: usize,
    pub(crate) ciphertext_size: usize,
}

impl Simulation {
    /// A simulation of a size-`ciphertext_size` ciphertext whose invariant
    /// noise budget is exactly `noise_budget` bits.
    pub fn new(
        params: &FvParameters,
        noise_budget: usize,
        ciphertext_size: usize,
    ) -> Result<Self> {
        let coeff_bits = params.coeff_modulus().significant_bit_count();
        if noise_budget + 1 >= coeff_bits {
            return Err(Error::invalid("noise_budget is not in the valid range"));
        }
        if ciphertext_size < 2 {
            return Err(Error::invalid(
                "ciphertext_size must be greater than or equal to 2",
            ));
        }
        // noise = 2^(bits(q) - budget - 1) - 1
        let noise_bits = coeff_bits - noise_budget - 1;
        let mut noise = BigUInt::from(1u64);
        noise <<= noise_bits;
        noise -= &BigUInt::from(1u64);
        Ok(Self::from_parts(params, noise, ciphertext_size))
    }

    pub(crate) fn from_parts(
        params: &FvParameters,
        noise: BigUInt,
        ciphertext_size: usize,
    ) -> Self {
        let mut out = Self {
            noise,
            coeff_modulus: params.coeff_modulus().clone(),
            plain_modulus: params.plain_modulus().clone(),
            poly_modulus_degree: params.degree(),
            noise_standard_deviation: params.noise_standard_deviation(),
            noise_max_deviation: params.noise_max_deviation(),
            decomposition_bit_count: params.decomposition_bit_count(),
            ciphertext_size,
        };
        out.clamp();
        out
    }

    fn with_noise(&self, noise: BigUInt, ciphertext_size: usize) -> Self {
        let mut out = Self {
            noise,
            ciphertext_size,
            ..self.clone()
        };
        out.clamp();
        out
    }

    // A noise bound above floor(q/2) means the ciphertext can no longer
    // decrypt; cap it there so later bounds stay meaningful.
    fn clamp(&mut self) {
        let max_noise = &self.coeff_modulus >> 1;
        if self.noise > max_noise {
            self.noise = max_noise;
        }
    }

    /// The simulated ciphertext size.
    pub fn ciphertext_size(&self) -> usize {
        self.ciphertext_size
    }

    /// The simulated invariant noise bound, scaled by q.
    pub fn noise(&self) -> &BigUInt {
        &self.noise
    }

    /// The simulated invariant noise budget, in bits.
    pub fn invariant_noise_budget(&self) -> usize {
        self.coeff_modulus
            .significant_bit_count()
            .saturating_sub(self.noise.significant_bit_count() + 1)
    }

    /// Whether the simulated ciphertext still decrypts with at least
    /// `budget_gap` bits of budget to spare.
    pub fn decrypts(&self, budget_gap: usize) -> bool {
        self.invariant_noise_budget() > budget_gap
    }

    fn same_parameters(&self, other: &Self) -> bool {
        self.coeff_modulus == other.coeff_modulus
            && self.plain_modulus == other.plain_modulus
            && self.poly_modulus_degree == other.poly_modulus_degree
            && self.noise_standard_deviation == other.noise_standard_deviation
            && self.noise_max_deviation == other.noise_max_deviation
            && self.decomposition_bit_count == other.decomposition_bit_count
    }

    fn effective_deviation(&self) -> f64 {
        self.noise_max_deviation
            .min(6.0 * self.noise_standard_deviation)
    }
}

/// Mirrors the evaluator operations on noise simulations.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulationEvaluator;

impl SimulationEvaluator {
    /// Creates a new simulation evaluator.
    pub fn new() -> Self {
        Self
    }

    /// The noise of a freshly encrypted plaintext with at most
    /// `plain_max_coeff_count` coefficients of magnitude at most
    /// `plain_max_abs_value`:
    /// r_t(q) * ma * mc + t * 7 * min(B, 6 sigma) * n.
    pub fn get_fresh(
        &self,
        params: &FvParameters,
        plain_max_coeff_count: usize,
        plain_max_abs_value: &BigUInt,
    ) -> Result<Simulation> {
        let mut mc = plain_max_coeff_count;
        if mc == 0 || mc > params.degree() {
            return Err(Error::invalid(
                "plain_max_coeff_count is not in the valid range",
            ));
        }
        if plain_max_abs_value.is_zero() {
            mc = 1;
        }

        let first = &(plain_max_abs_value * mc as u64) * &params.upper_half_increment;
        let deviation = params
            .noise_max_deviation()
            .min(6.0 * params.noise_standard_deviation());
        let second_scalar = (7.0 * deviation * params.degree() as f64) as u64;
        let second = params.plain_modulus() * second_scalar;
        Ok(Simulation::from_parts(params, &first + &second, 2))
    }

    /// Negation leaves the noise unchanged.
    pub fn negate(&self, simulation: &Simulation) -> Result<Simulation> {
        self.check(simulation)?;
        Ok(simulation.clone())
    }

    /// Addition sums the noises.
    pub fn add(&self, simulation1: &Simulation, simulation2: &Simulation) -> Result<Simulation> {
        self.check_pair(simulation1, simulation2)?;
        let noise = &simulation1.noise + &simulation2.noise;
        Ok(simulation1.with_noise(
            noise,
            simulation1.ciphertext_size.max(simulation2.ciphertext_size),
        ))
    }

    /// Addition of many operands sums all the noises.
    pub fn add_many(&self, simulations: &[Simulation]) -> Result<Simulation> {
        let (first, rest) = simulations
            .split_first()
            .ok_or_else(|| Error::invalid("simulations cannot be empty"))?;
        let mut acc = first.clone();
        for s in rest {
            acc = self.add(&acc, s)?;
        }
        Ok(acc)
    }

    /// Subtraction grows the noise like addition.
    pub fn sub(&self, simulation1: &Simulation, simulation2: &Simulation) -> Result<Simulation> {
        self.add(simulation1, simulation2)
    }

    /// Multiplication: with sizes s1 and s2, the new bound is
    /// t sqrt(3n) * ((12n)^((s1-1)/2) v2 + (12n)^((s2-1)/2) v1
    ///               + (12n)^((s1+s2-2)/2)).
    pub fn multiply(
        &self,
        simulation1: &Simulation,
        simulation2: &Simulation,
    ) -> Result<Simulation> {
        self.check_pair(simulation1, simulation2)?;
        let n = simulation1.poly_modulus_degree;
        let s1 = simulation1.ciphertext_size;
        let s2 = simulation2.ciphertext_size;
        let result_size = s1 + s2 - 1;

        let sqrt_factor_base = BigUInt::from((12.0 * n as f64).sqrt().ceil() as u64);
        let factor_1 = sqrt_factor_base.pow_u64((s1 - 1) as u64);
        let factor_2 = sqrt_factor_base.pow_u64((s2 - 1) as u64);
        let factor_total = sqrt_factor_base.pow_u64((s1 + s2 - 2) as u64);
        let leading = &simulation1.plain_modulus * ((3.0 * n as f64).sqrt().ceil() as u64);

        let mut noise = &(&simulation2.noise * &factor_1) + &(&simulation1.noise * &factor_2);
        noise += &factor_total;
        noise *= &leading;
        Ok(simulation1.with_noise(noise, result_size))
    }

    /// Squaring simulates as self-multiplication.
    pub fn square(&self, simulation: &Simulation) -> Result<Simulation> {
        self.multiply(simulation, simulation)
    }

    /// Relinearization to `destination_size` adds
    /// 2 min(B, 6 sigma) t n (l + 1) 2^w per step.
    pub fn relinearize(
        &self,
        simulation: &Simulation,
        destination_size: usize,
    ) -> Result<Simulation> {
        self.check(simulation)?;
        if destination_size < 2 || destination_size > simulation.ciphertext_size {
            return Err(Error::invalid(
                "destination_size must be at least 2 and at most the current size",
            ));
        }
        let w = simulation.decomposition_bit_count;
        if w == 0 {
            return Err(Error::logic(
                "relinearization requires a nonzero decomposition bit count",
            ));
        }
        let steps = simulation.ciphertext_size - destination_size;
        if steps == 0 {
            return Ok(simulation.clone());
        }
        let coeff_bits = simulation.coeff_modulus.significant_bit_count();
        let ell = (coeff_bits + w - 1) / w;

        let mut added = simulation.plain_modulus.clone();
        added <<= w;
        added *= (2.0 * simulation.effective_deviation() * simulation.poly_modulus_degree as f64)
            as u64;
        added *= (ell + 1) as u64;
        added *= steps as u64;

        let noise = &simulation.noise + &added;
        Ok(simulation.with_noise(noise, destination_size))
    }

    /// Plaintext multiplication scales the noise by ma * mc.
    pub fn multiply_plain(
        &self,
        simulation: &Simulation,
        plain_max_coeff_count: usize,
        plain_max_abs_value: &BigUInt,
    ) -> Result<Simulation> {
        self.check(simulation)?;
        if plain_max_coeff_count == 0 || plain_max_coeff_count >= simulation.poly_modulus_degree + 1
        {
            return Err(Error::invalid(
                "plain_max_coeff_count is not in the valid range",
            ));
        }
        let noise = &(&simulation.noise * plain_max_abs_value)
            * (plain_max_coeff_count as u64);
        Ok(simulation.with_noise(noise, simulation.ciphertext_size))
    }

    /// Plaintext addition adds r_t(q) * ma * mc.
    pub fn add_plain(
        &self,
        simulation: &Simulation,
        plain_max_coeff_count: usize,
        plain_max_abs_value: &BigUInt,
    ) -> Result<Simulation> {
        self.check(simulation)?;
        if plain_max_coeff_count == 0 || plain_max_coeff_count >= simulation.poly_modulus_degree + 1
        {
            return Err(Error::invalid(
                "plain_max_coeff_count is not in the valid range",
            ));
        }
        // r_t(q) = q mod t
        let remainder = BigUInt::from_biguint(
            &(simulation.coeff_modulus.to_biguint() % simulation.plain_modulus.to_biguint()),
        );
        let added = &(&remainder * plain_max_abs_value) * (plain_max_coeff_count as u64);
        let noise = &simulation.noise + &added;
        Ok(simulation.with_noise(noise, simulation.ciphertext_size))
    }

    /// Plaintext subtraction grows the noise like plaintext addition.
    pub fn sub_plain(
        &self,
        simulation: &Simulation,
        plain_max_coeff_count: usize,
        plain_max_abs_value: &BigUInt,
    ) -> Result<Simulation> {
        self.add_plain(simulation, plain_max_coeff_count, plain_max_abs_value)
    }

    /// A pairwise product tree with relinearization after every product.
    pub fn multiply_many(&self, simulations: &[Simulation]) -> Result<Simulation> {
        if simulations.is_empty() {
            return Err(Error::invalid("simulations cannot be empty"));
        }
        let mut queue: Vec<Simulation> = simulations.to_vec();
        let mut i = 0;
        while i + 1 < queue.len() {
            let product = self.multiply(&queue[i], &queue[i + 1])?;
            queue.push(self.relinearize(&product, 2)?);
            i += 2;
        }
        Ok(queue.pop().unwrap())
    }

    /// Exponentiation as a balanced product of `exponent` copies.
    pub fn exponentiate(&self, simulation: &Simulation, exponent: u64) -> Result<Simulation> {
        if exponent == 0 {
            return Err(Error::invalid("exponent cannot be zero"));
        }
        self.check(simulation)?;
        if exponent == 1 {
            return Ok(simulation.clone());
        }
        let copies = vec![simulation.clone(); exponent as usize];
        self.multiply_many(&copies)
    }

    fn check(&self, simulation: &Simulation) -> Result<()> {
        if simulation.ciphertext_size < 2 {
            return Err(Error::invalid("simulation has an invalid ciphertext size"));
        }
        Ok(())
    }

    fn check_pair(&self, a: &Simulation, b: &Simulation) -> Result<()> {
        self.check(a)?;
        self.check(b)?;
        if !a.same_parameters(b) {
            return Err(Error::invalid("mismatch in encryption parameters"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Simulation, SimulationEvaluator};
    use crate::parameters::{FvParameters, FvParametersBuilder};
    use fv_math::uint::BigUInt;

    fn params(decomposition_bit_count: usize) -> FvParameters {
        let mut b = FvParametersBuilder::new();
        b.set_poly_modulus_degree(2048)
            .unwrap()
            .set_coeff_modulus(&BigUInt::from_hex("FFFFFFFFFFFC001").unwrap())
            .unwrap()
            .set_plain_modulus_u64(4)
            .unwrap()
            .set_noise_standard_deviation(3.19)
            .unwrap()
            .set_noise_max_deviation(19.14)
            .unwrap()
            .set_decomposition_bit_count(decomposition_bit_count)
            .unwrap();
        b.build().unwrap()
    }

    #[test]
    fn test_budget_seeded_simulation() {
        let params = params(0);
        let sim = Simulation::new(&params, 20, 2).unwrap();
        assert_eq!(sim.invariant_noise_budget(), 20);
        assert!(sim.decrypts(19));
        assert!(!sim.decrypts(20));
        assert_eq!(sim.ciphertext_size(), 2);

        assert!(Simulation::new(&params, 60, 2).is_err());
        assert!(Simulation::new(&params, 10, 1).is_err());
    }

    #[test]
    fn test_fresh_noise_magnitude() {
        let params = params(0);
        let evaluator = SimulationEvaluator::new();
        let fresh = evaluator
            .get_fresh(&params, 1, &BigUInt::from(2))
            .unwrap();
        // r_t(q) * 2 + 4 * floor(7 * 19.14 * 2048) is about 2^20.
        let bits = fresh.noise().significant_bit_count();
        assert!((19..=21).contains(&bits), "noise bits {bits}");
        assert!(fresh.decrypts(30));
    }

    #[test]
    fn test_add_and_negate() {
        let params = params(0);
        let evaluator = SimulationEvaluator::new();
        let a = Simulation::new(&params, 30, 2).unwrap();
        let b = Simulation::new(&params, 30, 2).unwrap();
        let sum = evaluator.add(&a, &b).unwrap();
        // Doubling the noise costs exactly one budget bit here.
        assert_eq!(sum.invariant_noise_budget(), 29);
        let neg = evaluator.negate(&a).unwrap();
        assert_eq!(neg.invariant_noise_budget(), 30);
    }

    #[test]
    fn test_multiply_grows_and_clamps() {
        let params = params(0);
        let evaluator = SimulationEvaluator::new();
        let a = Simulation::new(&params, 40, 2).unwrap();
        let product = evaluator.multiply(&a, &a).unwrap();
        assert_eq!(product.ciphertext_size(), 3);
        assert!(product.invariant_noise_budget() < a.invariant_noise_budget());

        // Multiplying nearly-dead ciphertexts clamps at floor(q/2).
        let dead = Simulation::new(&params, 1, 2).unwrap();
        let clamped = evaluator.multiply(&dead, &dead).unwrap();
        assert_eq!(clamped.invariant_noise_budget(), 0);
        assert!(!clamped.decrypts(0));
    }

    #[test]
    fn test_relinearize_reduces_size() {
        let with_w = params(16);
        let evaluator = SimulationEvaluator::new();
        let a = Simulation::new(&with_w, 40, 4).unwrap();
        let relin = evaluator.relinearize(&a, 2).unwrap();
        assert_eq!(relin.ciphertext_size(), 2);
        assert!(relin.invariant_noise_budget() <= a.invariant_noise_budget());

        assert!(evaluator.relinearize(&a, 1).is_err());
        assert!(evaluator.relinearize(&a, 5).is_err());

        // Without a decomposition bit count the operation is unavailable.
        let no_w = Simulation::new(&params(0), 40, 3).unwrap();
        assert!(evaluator.relinearize(&no_w, 2).is_err());
    }

    #[test]
    fn test_parameter_mismatch_fails_fast() {
        let evaluator = SimulationEvaluator::new();
        let a = Simulation::new(&params(0), 30, 2).unwrap();
        let other = {
            let mut b = FvParametersBuilder::new();
            b.set_poly_modulus_degree(2048)
                .unwrap()
                .set_coeff_modulus(&BigUInt::from_hex("FFFFFFFFFFFC001").unwrap())
                .unwrap()
                .set_plain_modulus_u64(16)
                .unwrap();
            b.build().unwrap()
        };
        let b = Simulation::new(&other, 30, 2).unwrap();
        assert!(evaluator.add(&a, &b).is_err());
    }
}
