//! Polynomial sampling for key generation and encryption.

use rand::distributions::{Distribution, Uniform};

use fv_math::rq::BigPoly;
use fv_math::uint::ops;
use fv_traits::RandomGenerator;
use fv_util::ClippedNormal;

use crate::parameters::FvParameters;

/// A polynomial with coefficients uniform in [0, q), by rejection on the
/// top limb.
pub(crate) fn sample_poly_uniform(
    params: &FvParameters,
    rng: &mut dyn RandomGenerator,
) -> BigPoly {
    let n = params.degree();
    let bits = params.coeff_bit_count();
    let q = params.coeff_mod.as_slice();
    let mut poly = BigPoly::new(n, bits);
    for i in 0..n {
        let coeff = poly.coeff_mut(i);
        loop {
            for limb in coeff.iter_mut() {
                *limb = rng.next_u64();
            }
            ops::filter_highbits_uint(coeff, bits);
            if ops::compare_uint_uint(coeff, q) == std::cmp::Ordering::Less {
                break;
            }
        }
    }
    poly
}

/// A polynomial with coefficients uniform in {-1, 0, 1}, lifted to the
/// positive residues {q - 1, 0, 1}.
pub(crate) fn sample_poly_ternary(
    params: &FvParameters,
    rng: &mut dyn RandomGenerator,
) -> BigPoly {
    let n = params.degree();
    let bits = params.coeff_bit_count();
    let q = params.coeff_mod.as_slice();
    let dist = Uniform::from(-1i32..=1);
    let mut poly = BigPoly::new(n, bits);
    for i in 0..n {
        match dist.sample(rng) {
            1 => poly.set_coeff_u64(i, 1),
            -1 => {
                let coeff = poly.coeff_mut(i);
                ops::set_uint_uint(q, coeff);
                ops::sub_uint_uint_inplace(coeff, &[1u64]);
            }
            _ => {}
        }
    }
    poly
}

/// A polynomial with coefficients drawn from the clipped normal
/// distribution, rounded and lifted to positive residues.
pub(crate) fn sample_poly_normal(params: &FvParameters, rng: &mut dyn RandomGenerator) -> BigPoly {
    let n = params.degree();
    let bits = params.coeff_bit_count();
    let q = params.coeff_mod.as_slice();
    let mut poly = BigPoly::new(n, bits);
    if params.noise_standard_deviation() == 0.0 || params.noise_max_deviation() == 0.0 {
        return poly;
    }
    let dist = ClippedNormal::new(
        0.0,
        params.noise_standard_deviation(),
        params.noise_max_deviation(),
    );
    for i in 0..n {
        let noise = dist.sample(rng).round() as i64;
        if noise > 0 {
            poly.set_coeff_u64(i, noise as u64);
        } else if noise < 0 {
            let coeff = poly.coeff_mut(i);
            ops::set_uint_uint(q, coeff);
            ops::sub_uint_uint_inplace(coeff, &[(-noise) as u64]);
        }
    }
    poly
}

#[cfg(test)]
mod tests {
    use super::{sample_poly_normal, sample_poly_ternary, sample_poly_uniform};
    use crate::parameters::FvParametersBuilder;
    use fv_math::uint::BigUInt;
    use fv_traits::RandomGeneratorFactory;
    use fv_util::ChaChaRandomGeneratorFactory;

    #[test]
    fn test_sampler_domains() {
        let params = {
            let mut b = FvParametersBuilder::new();
            b.set_poly_modulus_degree(64)
                .unwrap()
                .set_coeff_modulus(&BigUInt::from((1u64 << 48) - (1 << 16) - 1))
                .unwrap()
                .set_plain_modulus_u64(256)
                .unwrap();
            b.build().unwrap()
        };
        let factory = ChaChaRandomGeneratorFactory::from_seed([13u8; 32]);
        let mut rng = factory.create();
        let q = params.coeff_modulus().clone();
        let q_minus_one = &q - &BigUInt::from(1);

        let u = sample_poly_uniform(&params, rng.as_mut());
        assert!(u.are_coefficients_less_than(q.as_slice()));
        assert!(u.significant_coeff_count() > 0);

        let t = sample_poly_ternary(&params, rng.as_mut());
        for i in 0..t.coeff_count() {
            let c = t.coeff_big_uint(i);
            assert!(c == BigUInt::zero() || c == BigUInt::from(1) || c == q_minus_one);
        }

        let e = sample_poly_normal(&params, rng.as_mut());
        for i in 0..e.coeff_count() {
            let c = e.coeff_big_uint(i);
            let centered_small = c <= BigUInt::from(20) || &q - &c <= BigUInt::from(20);
            assert!(centered_small);
        }
    }

    #[test]
    fn test_zero_deviation_noise_is_zero() {
        let params = {
            let mut b = FvParametersBuilder::new();
            b.set_poly_modulus_degree(64)
                .unwrap()
                .set_coeff_modulus(&BigUInt::from((1u64 << 48) - (1 << 16) - 1))
                .unwrap()
                .set_plain_modulus_u64(256)
                .unwrap()
                .set_noise_standard_deviation(0.0)
                .unwrap();
            b.build().unwrap()
        };
        let factory = ChaChaRandomGeneratorFactory::from_seed([13u8; 32]);
        let mut rng = factory.create();
        assert!(sample_poly_normal(&params, rng.as_mut()).is_zero());
    }
}
