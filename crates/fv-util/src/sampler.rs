//! Noise samplers.

use rand::distributions::{Distribution, OpenClosed01};
use rand::Rng;

/// Normal distribution with mean `mean` and standard deviation
/// `standard_deviation`, rejecting samples that deviate from the mean by
/// more than `max_deviation`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClippedNormal {
    mean: f64,
    standard_deviation: f64,
    max_deviation: f64,
}

impl ClippedNormal {
    /// Create a clipped normal distribution.
    ///
    /// Panics if the standard deviation is negative or the clipping bound is
    /// smaller than the standard deviation would ever allow a sample.
    pub fn new(mean: f64, standard_deviation: f64, max_deviation: f64) -> Self {
        assert!(standard_deviation >= 0.0);
        assert!(max_deviation >= 0.0);
        Self {
            mean,
            standard_deviation,
            max_deviation,
        }
    }

    /// The mean of the distribution.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// The standard deviation of the distribution.
    pub fn standard_deviation(&self) -> f64 {
        self.standard_deviation
    }

    /// The clipping bound of the distribution.
    pub fn max_deviation(&self) -> f64 {
        self.max_deviation
    }
}

impl Distribution<f64> for ClippedNormal {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.standard_deviation == 0.0 || self.max_deviation == 0.0 {
            return self.mean;
        }
        loop {
            // Box-Muller on uniforms from (0, 1].
            let u1: f64 = OpenClosed01.sample(rng);
            let u2: f64 = OpenClosed01.sample(rng);
            let r = (-2.0 * u1.ln()).sqrt() * self.standard_deviation;
            let theta = 2.0 * std::f64::consts::PI * u2;
            for value in [r * theta.cos(), r * theta.sin()] {
                if value.abs() <= self.max_deviation {
                    return self.mean + value;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ClippedNormal;
    use rand::distributions::Distribution;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_samples_are_clipped() {
        let mut rng = ChaCha8Rng::from_seed([7u8; 32]);
        let dist = ClippedNormal::new(0.0, 3.19, 19.14);
        for _ in 0..10_000 {
            let x = dist.sample(&mut rng);
            assert!(x.abs() <= 19.14);
        }
    }

    #[test]
    fn test_zero_deviation_is_constant() {
        let mut rng = ChaCha8Rng::from_seed([7u8; 32]);
        let dist = ClippedNormal::new(1.5, 0.0, 19.14);
        for _ in 0..16 {
            assert_eq!(dist.sample(&mut rng), 1.5);
        }
    }

    #[test]
    fn test_empirical_moments() {
        let mut rng = ChaCha8Rng::from_seed([11u8; 32]);
        let dist = ClippedNormal::new(0.0, 3.19, 19.14);
        let n = 100_000;
        let samples: Vec<f64> = (0..n).map(|_| dist.sample(&mut rng)).collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.1);
        assert!((var.sqrt() - 3.19).abs() < 0.1);
    }
}
