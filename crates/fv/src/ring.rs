//! Ring-level helpers shared by key generation, encryption, decryption and
//! evaluation: multiplication in R_q dispatched on the qualifier vector,
//! domain transforms, and the Galois coefficient permutation.

use fv_math::ntt::{inverse_ntt_negacyclic_harvey, ntt_negacyclic_harvey};
use fv_math::nussbaumer::nussbaumer_multiply_poly_poly_coeffmod;
use fv_math::rq::{dyadic_product_coeffmod, BigPoly};
use fv_math::uint::ops;

use crate::parameters::FvParameters;
use crate::{Error, Result};

/// Transform a polynomial in R_q (power basis, coefficients below q) into
/// the NTT domain.
pub(crate) fn to_ntt(params: &FvParameters, poly: &mut BigPoly) -> Result<()> {
    let tables = params
        .ntt_tables
        .as_ref()
        .ok_or_else(|| Error::logic("the NTT is not enabled for these parameters"))?;
    ntt_negacyclic_harvey(poly.as_mut_slice(), tables);
    Ok(())
}

/// Transform a polynomial out of the NTT domain.
pub(crate) fn from_ntt(params: &FvParameters, poly: &mut BigPoly) -> Result<()> {
    let tables = params
        .ntt_tables
        .as_ref()
        .ok_or_else(|| Error::logic("the NTT is not enabled for these parameters"))?;
    inverse_ntt_negacyclic_harvey(poly.as_mut_slice(), tables);
    Ok(())
}

/// Multiply two ring elements held in the scheme's canonical domain: the
/// NTT domain when the qualifiers enable it, the power basis otherwise.
pub(crate) fn canonical_multiply(
    params: &FvParameters,
    a: &BigPoly,
    b: &BigPoly,
) -> Result<BigPoly> {
    let mut out = BigPoly::new(params.degree(), params.coeff_bit_count());
    if params.qualifiers().enable_ntt {
        dyadic_product_coeffmod(a, b, &params.coeff_mod, &mut out)?;
    } else {
        nussbaumer_multiply_poly_poly_coeffmod(
            a,
            b,
            params.polymod.coeff_count_power(),
            &params.coeff_mod,
            &mut out,
        )?;
    }
    Ok(out)
}

/// Multiply two ring elements given in the power basis, returning the
/// product in the power basis, through whichever back-end the qualifiers
/// enable.
pub(crate) fn power_basis_multiply(
    params: &FvParameters,
    a: &BigPoly,
    b: &BigPoly,
) -> Result<BigPoly> {
    if params.qualifiers().enable_ntt {
        let mut a_ntt = a.clone();
        let mut b_ntt = b.clone();
        to_ntt(params, &mut a_ntt)?;
        to_ntt(params, &mut b_ntt)?;
        let mut out = canonical_multiply(params, &a_ntt, &b_ntt)?;
        from_ntt(params, &mut out)?;
        Ok(out)
    } else {
        canonical_multiply(params, a, b)
    }
}

/// Apply the automorphism x -> x^elt to a power-basis ring element:
/// coefficient i moves to position i * elt mod 2n, negated when it crosses
/// the degree-n boundary.
pub(crate) fn apply_galois_poly(
    params: &FvParameters,
    poly: &BigPoly,
    galois_elt: u64,
) -> Result<BigPoly> {
    let n = params.degree() as u64;
    if galois_elt % 2 == 0 || galois_elt >= 2 * n {
        return Err(Error::invalid(
            "the Galois element must be odd and less than 2n",
        ));
    }
    let mut out = BigPoly::new(params.degree(), params.coeff_bit_count());
    for i in 0..params.degree() {
        let src = poly.coeff(i);
        if ops::is_zero_uint(src) {
            continue;
        }
        let index = ((i as u64) * galois_elt) % (2 * n);
        if index < n {
            out.coeff_mut(index as usize).copy_from_slice(src);
        } else {
            let dst = out.coeff_mut((index - n) as usize);
            params.coeff_mod.negate_uint_mod(src, dst);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{apply_galois_poly, power_basis_multiply};
    use crate::parameters::FvParametersBuilder;
    use fv_math::rq::{nonfft_multiply_poly_poly_polymod_coeffmod, BigPoly, PolyModulus};
    use fv_math::uint::BigUInt;

    #[test]
    fn test_power_basis_multiply_both_paths() {
        // NTT path: q = 65537, n = 8.
        let ntt_params = {
            let mut b = FvParametersBuilder::new();
            b.set_poly_modulus_degree(8)
                .unwrap()
                .set_coeff_modulus(&BigUInt::from(65537))
                .unwrap()
                .set_plain_modulus_u64(16)
                .unwrap();
            b.build().unwrap()
        };
        // Nussbaumer path: q - 1 = 2 * odd has no 16th root of unity.
        let nuss_params = {
            let mut b = FvParametersBuilder::new();
            b.set_poly_modulus_degree(8)
                .unwrap()
                .set_coeff_modulus(&BigUInt::from((1u64 << 48) - (1 << 16) - 1))
                .unwrap()
                .set_plain_modulus_u64(256)
                .unwrap();
            b.build().unwrap()
        };
        assert!(ntt_params.qualifiers().enable_ntt);
        assert!(!nuss_params.qualifiers().enable_ntt);

        for params in [&ntt_params, &nuss_params] {
            let bits = params.coeff_bit_count();
            let a = BigPoly::from_u64_coeffs(&[5, 1, 3, 2, 0, 0, 7, 1], bits);
            let b = BigPoly::from_u64_coeffs(&[7, 7, 0, 2, 1, 0, 0, 9], bits);
            let got = power_basis_multiply(params, &a, &b).unwrap();

            let pm = PolyModulus::one_zero_one(8).unwrap();
            let mut expected = BigPoly::new(8, bits);
            nonfft_multiply_poly_poly_polymod_coeffmod(
                &a,
                &b,
                &pm,
                &params.coeff_mod,
                &mut expected,
            )
            .unwrap();
            assert_eq!(got, expected);
        }
    }

    #[test]
    fn test_apply_galois() {
        let params = {
            let mut b = FvParametersBuilder::new();
            b.set_poly_modulus_degree(4)
                .unwrap()
                .set_coeff_modulus(&BigUInt::from(97))
                .unwrap()
                .set_plain_modulus_u64(4)
                .unwrap();
            b.build().unwrap()
        };
        // (1 + 2x + 3x^2 + 4x^3) under x -> x^3:
        // 1 + 2x^3 + 3x^6 + 4x^9 = 1 + 2x^3 - 3x^2 + 4x (since x^4 = -1).
        let p = BigPoly::from_u64_coeffs(&[1, 2, 3, 4], params.coeff_bit_count());
        let got = apply_galois_poly(&params, &p, 3).unwrap();
        assert_eq!(
            got,
            BigPoly::from_u64_coeffs(&[1, 4, 97 - 3, 2], params.coeff_bit_count())
        );

        // The identity element is a no-op; even elements are rejected.
        let id = apply_galois_poly(&params, &p, 1).unwrap();
        assert_eq!(id, p);
        assert!(apply_galois_poly(&params, &p, 2).is_err());
        assert!(apply_galois_poly(&params, &p, 9).is_err());
    }
}
