//! Coefficient-wise and polynomial arithmetic over R_q.

use std::cmp::Ordering;

use super::{BigPoly, PolyModulus};
use crate::uint::ops::{self, add_uint_uint_inplace, multiply_uint_uint, set_uint_uint};
use crate::uint::BigUInt;
use crate::zq::Modulus;
use crate::{Error, Result};

fn check_shapes(a: &BigPoly, b: &BigPoly, result: &BigPoly) -> Result<()> {
    if a.coeff_count() != b.coeff_count()
        || a.coeff_count() != result.coeff_count()
        || a.coeff_uint64_count() != b.coeff_uint64_count()
        || a.coeff_uint64_count() != result.coeff_uint64_count()
    {
        return Err(Error::invalid("polynomial shapes do not match"));
    }
    Ok(())
}

/// `result = a + b` coefficient-wise mod q. All three polynomials share one
/// shape, with coefficients already reduced below q.
pub fn add_poly_poly_coeffmod(
    a: &BigPoly,
    b: &BigPoly,
    modulus: &Modulus,
    result: &mut BigPoly,
) -> Result<()> {
    check_shapes(a, b, result)?;
    for i in 0..a.coeff_count() {
        modulus.add_uint_uint_mod(a.coeff(i), b.coeff(i), result.coeff_mut(i));
    }
    Ok(())
}

/// `result = a - b` coefficient-wise mod q.
pub fn sub_poly_poly_coeffmod(
    a: &BigPoly,
    b: &BigPoly,
    modulus: &Modulus,
    result: &mut BigPoly,
) -> Result<()> {
    check_shapes(a, b, result)?;
    for i in 0..a.coeff_count() {
        modulus.sub_uint_uint_mod(a.coeff(i), b.coeff(i), result.coeff_mut(i));
    }
    Ok(())
}

/// `result = -a` coefficient-wise mod q.
pub fn negate_poly_coeffmod(a: &BigPoly, modulus: &Modulus, result: &mut BigPoly) -> Result<()> {
    check_shapes(a, a, result)?;
    for i in 0..a.coeff_count() {
        modulus.negate_uint_mod(a.coeff(i), result.coeff_mut(i));
    }
    Ok(())
}

/// `result = a * scalar` coefficient-wise mod q.
pub fn multiply_poly_scalar_coeffmod(
    a: &BigPoly,
    scalar: &[u64],
    modulus: &Modulus,
    result: &mut BigPoly,
) -> Result<()> {
    check_shapes(a, a, result)?;
    for i in 0..a.coeff_count() {
        modulus.multiply_uint_uint_mod(a.coeff(i), scalar, result.coeff_mut(i));
    }
    Ok(())
}

/// Coefficient-wise product mod q of two polynomials in NTT domain.
pub fn dyadic_product_coeffmod(
    a: &BigPoly,
    b: &BigPoly,
    modulus: &Modulus,
    result: &mut BigPoly,
) -> Result<()> {
    check_shapes(a, b, result)?;
    for i in 0..a.coeff_count() {
        modulus.multiply_uint_uint_mod(a.coeff(i), b.coeff(i), result.coeff_mut(i));
    }
    Ok(())
}

/// Schoolbook product of two polynomials over the integers.
///
/// `result` must have `a.coeff_count() + b.coeff_count() - 1` coefficients
/// and a coefficient width wide enough for the exact sums of products.
pub fn multiply_poly_poly(a: &BigPoly, b: &BigPoly, result: &mut BigPoly) -> Result<()> {
    if result.coeff_count() + 1 != a.coeff_count() + b.coeff_count() {
        return Err(Error::invalid("result has the wrong coefficient count"));
    }
    result.set_zero();
    let limbs = result.coeff_uint64_count();
    let mut product = vec![0u64; limbs];
    for i in 0..a.coeff_count() {
        if ops::is_zero_uint(a.coeff(i)) {
            continue;
        }
        for j in 0..b.coeff_count() {
            if ops::is_zero_uint(b.coeff(j)) {
                continue;
            }
            multiply_uint_uint(a.coeff(i), b.coeff(j), &mut product);
            add_uint_uint_inplace(result.coeff_mut(i + j), &product);
        }
    }
    Ok(())
}

/// Reduce `value` in place modulo the polynomial modulus, with coefficients
/// mod q. Coefficients at degree n and above are folded down; they are
/// zeroed afterwards.
pub fn modulo_poly_inplace(
    value: &mut BigPoly,
    poly_modulus: &PolyModulus,
    modulus: &Modulus,
) -> Result<()> {
    let n = poly_modulus.degree();
    if value.coeff_count() <= n {
        return Ok(());
    }
    if poly_modulus.is_one_zero_one() {
        // x^n = -1: subtract high coefficients into their mirror position,
        // highest first so that chained folds see reduced inputs.
        let limbs = value.coeff_uint64_count();
        let mut high = vec![0u64; limbs];
        for i in (n..value.coeff_count()).rev() {
            if ops::is_zero_uint(value.coeff(i)) {
                continue;
            }
            set_uint_uint(value.coeff(i), &mut high);
            let low = value.coeff_mut(i - n);
            let tmp = low.to_vec();
            modulus.sub_uint_uint_mod(&tmp, &high, low);
            ops::set_zero_uint(value.coeff_mut(i));
        }
        return Ok(());
    }
    // General monic-leading-coefficient path through long division.
    let (_, remainder) = divide_poly_poly_coeffmod(value, poly_modulus.poly(), modulus)?;
    value.set_zero();
    for i in 0..remainder.coeff_count().min(value.coeff_count()) {
        set_uint_uint(remainder.coeff(i), value.coeff_mut(i));
    }
    Ok(())
}

/// Polynomial long division over Z_q: returns (quotient, remainder) with
/// `numerator = quotient * denominator + remainder` and
/// `deg remainder < deg denominator`.
///
/// Fails with `InvariantViolation` when the denominator's leading
/// coefficient is not invertible mod q.
pub fn divide_poly_poly_coeffmod(
    numerator: &BigPoly,
    denominator: &BigPoly,
    modulus: &Modulus,
) -> Result<(BigPoly, BigPoly)> {
    let limbs = modulus.uint64_count();
    let den_sig = denominator.significant_coeff_count();
    if den_sig == 0 {
        return Err(Error::invalid("division by the zero polynomial"));
    }
    let den_degree = den_sig - 1;
    let bits = modulus.significant_bit_count();

    let mut leading_inv = vec![0u64; limbs];
    let mut leading = vec![0u64; limbs];
    set_uint_uint(denominator.coeff(den_degree), &mut leading);
    modulus.modulo_uint_inplace(&mut leading)?;
    if !modulus.try_invert_uint_mod(&leading, &mut leading_inv) {
        return Err(Error::InvariantViolation(
            "leading coefficient is not invertible".to_string(),
        ));
    }

    let num_sig = numerator.significant_coeff_count();
    let mut remainder = BigPoly::new(num_sig.max(1), bits);
    for i in 0..num_sig {
        let mut c = vec![0u64; limbs.max(numerator.coeff_uint64_count())];
        set_uint_uint(numerator.coeff(i), &mut c);
        modulus.modulo_uint_inplace(&mut c)?;
        set_uint_uint(&c, remainder.coeff_mut(i));
    }
    let mut quotient = BigPoly::new(num_sig.saturating_sub(den_degree).max(1), bits);

    let mut factor = vec![0u64; limbs];
    let mut product = vec![0u64; limbs];
    let mut rem_degree = remainder.significant_coeff_count();
    while rem_degree > den_degree {
        let shift = rem_degree - 1 - den_degree;
        // factor = leading(remainder) / leading(denominator)
        modulus.multiply_uint_uint_mod(remainder.coeff(rem_degree - 1), &leading_inv, &mut factor);
        set_uint_uint(&factor, quotient.coeff_mut(shift));
        // remainder -= factor * x^shift * denominator
        for j in 0..den_sig {
            let mut den_c = vec![0u64; limbs.max(denominator.coeff_uint64_count())];
            set_uint_uint(denominator.coeff(j), &mut den_c);
            modulus.modulo_uint_inplace(&mut den_c)?;
            modulus.multiply_uint_uint_mod(&factor, &den_c[..limbs], &mut product);
            let dst = remainder.coeff_mut(shift + j);
            let tmp = dst.to_vec();
            modulus.sub_uint_uint_mod(&tmp, &product, dst);
        }
        debug_assert!(ops::is_zero_uint(remainder.coeff(rem_degree - 1)));
        rem_degree = remainder.significant_coeff_count();
    }

    remainder.resize(den_degree.max(1), bits);
    Ok((quotient, remainder))
}

/// Schoolbook product reduced by the polynomial modulus and the coefficient
/// modulus. Operand coefficients must be reduced below q.
pub fn nonfft_multiply_poly_poly_polymod_coeffmod(
    a: &BigPoly,
    b: &BigPoly,
    poly_modulus: &PolyModulus,
    modulus: &Modulus,
    result: &mut BigPoly,
) -> Result<()> {
    let n = poly_modulus.degree();
    if a.coeff_count() > n || b.coeff_count() > n {
        return Err(Error::OutOfRange(
            "operand degree reaches the polynomial modulus degree".to_string(),
        ));
    }
    // Exact wide product, then scalar reduction, then polynomial reduction.
    let product_bits =
        a.significant_coeff_bit_count() + b.significant_coeff_bit_count() + n.ilog2() as usize + 1;
    let mut wide = BigPoly::new(a.coeff_count() + b.coeff_count() - 1, product_bits.max(1));
    multiply_poly_poly(a, b, &mut wide)?;

    let limbs = modulus.uint64_count();
    let bits = modulus.significant_bit_count();
    let mut reduced = BigPoly::new(wide.coeff_count(), bits);
    let mut scratch = vec![0u64; wide.coeff_uint64_count().max(limbs)];
    for i in 0..wide.coeff_count() {
        set_uint_uint(wide.coeff(i), &mut scratch);
        modulus.modulo_uint_inplace(&mut scratch)?;
        set_uint_uint(&scratch, reduced.coeff_mut(i));
    }
    modulo_poly_inplace(&mut reduced, poly_modulus, modulus)?;

    if result.coeff_count() < n || result.coeff_uint64_count() < limbs {
        return Err(Error::invalid("result shape is too small"));
    }
    result.set_zero();
    for i in 0..n.min(reduced.coeff_count()) {
        set_uint_uint(reduced.coeff(i), result.coeff_mut(i));
    }
    Ok(())
}

/// Modular inverse in R_q by the extended Euclidean algorithm.
///
/// Returns `false` when the operand is not invertible (including when an
/// intermediate leading coefficient has no inverse mod q).
pub fn try_invert_poly_coeffmod(
    operand: &BigPoly,
    poly_modulus: &PolyModulus,
    modulus: &Modulus,
    result: &mut BigPoly,
) -> Result<bool> {
    let n = poly_modulus.degree();
    if operand.significant_coeff_count() == 0 {
        return Ok(false);
    }
    if operand.coeff_count() > n {
        return Err(Error::OutOfRange(
            "operand degree reaches the polynomial modulus degree".to_string(),
        ));
    }
    let bits = modulus.significant_bit_count();
    let limbs = modulus.uint64_count();

    // r0 = x^n + 1, r1 = operand; t0, t1 track the operand cofactors.
    let mut r0 = BigPoly::new(n + 1, bits);
    for i in 0..=n {
        set_uint_uint(poly_modulus.poly().coeff(i), r0.coeff_mut(i));
    }
    let mut r1 = BigPoly::new(n + 1, bits);
    for i in 0..operand.coeff_count() {
        let mut c = vec![0u64; limbs.max(operand.coeff_uint64_count())];
        set_uint_uint(operand.coeff(i), &mut c);
        modulus.modulo_uint_inplace(&mut c)?;
        set_uint_uint(&c, r1.coeff_mut(i));
    }
    let mut t0 = BigPoly::new(n + 1, bits);
    let mut t1 = BigPoly::new(n + 1, bits);
    t1.set_coeff_u64(0, 1);

    while r1.significant_coeff_count() > 1 {
        let (quotient, remainder) = match divide_poly_poly_coeffmod(&r0, &r1, modulus) {
            Ok(qr) => qr,
            Err(Error::InvariantViolation(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        // t_next = t0 - quotient * t1 mod (x^n + 1, q)
        let mut q_t1 = BigPoly::new(
            quotient.coeff_count() + t1.coeff_count() - 1,
            2 * bits + quotient.coeff_count().ilog2() as usize + 2,
        );
        multiply_poly_poly(&quotient, &t1, &mut q_t1)?;
        let mut q_t1_red = BigPoly::new(q_t1.coeff_count(), bits);
        let mut scratch = vec![0u64; q_t1.coeff_uint64_count().max(limbs)];
        for i in 0..q_t1.coeff_count() {
            set_uint_uint(q_t1.coeff(i), &mut scratch);
            modulus.modulo_uint_inplace(&mut scratch)?;
            set_uint_uint(&scratch, q_t1_red.coeff_mut(i));
        }
        modulo_poly_inplace(&mut q_t1_red, poly_modulus, modulus)?;
        q_t1_red.resize(n + 1, bits);
        let mut t_next = BigPoly::new(n + 1, bits);
        sub_poly_poly_coeffmod(&t0, &q_t1_red, modulus, &mut t_next)?;

        let mut r_next = BigPoly::new(n + 1, bits);
        for i in 0..remainder.coeff_count().min(n + 1) {
            set_uint_uint(remainder.coeff(i), r_next.coeff_mut(i));
        }
        r0 = std::mem::replace(&mut r1, r_next);
        t0 = std::mem::replace(&mut t1, t_next);
    }

    if r1.significant_coeff_count() == 0 {
        // gcd has positive degree.
        return Ok(false);
    }
    // r1 is a nonzero constant c; the inverse is t1 / c.
    let mut c_inv = vec![0u64; limbs];
    if !modulus.try_invert_uint_mod(&r1.coeff(0)[..limbs], &mut c_inv) {
        return Ok(false);
    }
    if result.coeff_count() < n || result.coeff_uint64_count() < limbs {
        return Err(Error::invalid("result shape is too small"));
    }
    result.set_zero();
    for i in 0..n.min(t1.coeff_count()) {
        modulus.multiply_uint_uint_mod(t1.coeff(i), &c_inv, result.coeff_mut(i));
    }
    Ok(true)
}

/// The centered infinity norm max_i min(c_i, q - c_i) of a polynomial with
/// coefficients reduced below q.
pub fn poly_infty_norm_coeffmod(poly: &BigPoly, modulus: &Modulus) -> BigUInt {
    let limbs = modulus.uint64_count();
    let mut best = BigUInt::new(modulus.significant_bit_count());
    let mut centered = vec![0u64; limbs];
    for i in 0..poly.coeff_count() {
        let c = poly.coeff(i);
        let q_minus_c = {
            modulus.negate_uint_mod(c, &mut centered);
            &centered
        };
        let magnitude = if ops::is_zero_uint(c) {
            c
        } else if ops::compare_uint_uint(c, q_minus_c) == Ordering::Less {
            c
        } else {
            q_minus_c
        };
        if ops::compare_uint_uint(magnitude, best.as_slice()) == Ordering::Greater {
            set_uint_uint(magnitude, best.as_mut_slice());
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rq::{BigPoly, PolyModulus};
    use crate::zq::Modulus;

    fn poly_mod(n: usize) -> PolyModulus {
        PolyModulus::one_zero_one(n).unwrap()
    }

    #[test]
    fn test_coeffmod_ops() {
        let q = Modulus::new(&[13]).unwrap();
        let a = BigPoly::from_u64_coeffs(&[12, 5, 0, 7], 64);
        let b = BigPoly::from_u64_coeffs(&[3, 9, 1, 0], 64);
        let mut r = BigPoly::new(4, 64);

        add_poly_poly_coeffmod(&a, &b, &q, &mut r).unwrap();
        assert_eq!(r, BigPoly::from_u64_coeffs(&[2, 1, 1, 7], 64));

        sub_poly_poly_coeffmod(&a, &b, &q, &mut r).unwrap();
        assert_eq!(r, BigPoly::from_u64_coeffs(&[9, 9, 12, 7], 64));

        negate_poly_coeffmod(&a, &q, &mut r).unwrap();
        assert_eq!(r, BigPoly::from_u64_coeffs(&[1, 8, 0, 6], 64));

        dyadic_product_coeffmod(&a, &b, &q, &mut r).unwrap();
        assert_eq!(r, BigPoly::from_u64_coeffs(&[10, 6, 0, 0], 64));

        multiply_poly_scalar_coeffmod(&a, &[2], &q, &mut r).unwrap();
        assert_eq!(r, BigPoly::from_u64_coeffs(&[11, 10, 0, 1], 64));
    }

    #[test]
    fn test_schoolbook_multiply() {
        // (1 + 2x)(3 + 4x) = 3 + 10x + 8x^2
        let a = BigPoly::from_u64_coeffs(&[1, 2], 64);
        let b = BigPoly::from_u64_coeffs(&[3, 4], 64);
        let mut r = BigPoly::new(3, 130);
        multiply_poly_poly(&a, &b, &mut r).unwrap();
        assert_eq!(r, BigPoly::from_u64_coeffs(&[3, 10, 8], 64));
    }

    #[test]
    fn test_modulo_poly_one_zero_one() {
        // x^4 = -1 mod x^4 + 1: x^5 + x^4 + 1 == -x - 1 + 1 == -x
        let q = Modulus::new(&[13]).unwrap();
        let mut v = BigPoly::from_u64_coeffs(&[1, 0, 0, 0, 1, 1], 64);
        modulo_poly_inplace(&mut v, &poly_mod(4), &q).unwrap();
        assert_eq!(v, BigPoly::from_u64_coeffs(&[0, 12, 0, 0, 0, 0], 64));
    }

    #[test]
    fn test_negacyclic_product_mod_27() {
        // (x^3 + 3x^2 + x + 5)(2x^3 + 7x + 7)
        //   = 2x^6 + 6x^5 + 9x^4 + 38x^3 + 28x^2 + 42x + 35
        //   = 11x^3 + 26x^2 + 9x + 26 mod (x^4 + 1, 27)
        let q = Modulus::new(&[27]).unwrap();
        let pm = poly_mod(4);
        let a = BigPoly::from_u64_coeffs(&[5, 1, 3, 1], 64);
        let b = BigPoly::from_u64_coeffs(&[7, 7, 0, 2], 64);
        let mut r = BigPoly::new(4, 64);
        nonfft_multiply_poly_poly_polymod_coeffmod(&a, &b, &pm, &q, &mut r).unwrap();
        assert_eq!(r, BigPoly::from_u64_coeffs(&[26, 9, 26, 11], 64));
    }

    #[test]
    fn test_poly_division() {
        // (x^3 + 2x^2 + 3x + 4) / (x + 1) over Z_13:
        // quotient x^2 + x + 2, remainder 2.
        let q = Modulus::new(&[13]).unwrap();
        let num = BigPoly::from_u64_coeffs(&[4, 3, 2, 1], 64);
        let den = BigPoly::from_u64_coeffs(&[1, 1], 64);
        let (quot, rem) = divide_poly_poly_coeffmod(&num, &den, &q).unwrap();
        assert_eq!(quot, BigPoly::from_u64_coeffs(&[2, 1, 1], 64));
        assert_eq!(rem, BigPoly::from_u64_coeffs(&[2], 64));

        // Non-invertible leading coefficient mod 12.
        let q12 = Modulus::new(&[12]).unwrap();
        let den = BigPoly::from_u64_coeffs(&[1, 4], 64);
        assert!(matches!(
            divide_poly_poly_coeffmod(&num, &den, &q12),
            Err(Error::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_poly_inverse_roundtrip() {
        let q = Modulus::new(&[65537]).unwrap();
        let pm = poly_mod(8);
        let a = BigPoly::from_u64_coeffs(&[5, 1, 3, 0, 0, 2, 0, 11], 64);
        let mut inv = BigPoly::new(8, 64);
        assert!(try_invert_poly_coeffmod(&a, &pm, &q, &mut inv).unwrap());

        let mut product = BigPoly::new(8, 64);
        nonfft_multiply_poly_poly_polymod_coeffmod(&a, &inv, &pm, &q, &mut product).unwrap();
        assert_eq!(product, BigPoly::from_u64_coeffs(&[1], 64));
    }

    #[test]
    fn test_poly_inverse_of_zero() {
        let q = Modulus::new(&[65537]).unwrap();
        let pm = poly_mod(8);
        let zero = BigPoly::new(8, 64);
        let mut inv = BigPoly::new(8, 64);
        assert!(!try_invert_poly_coeffmod(&zero, &pm, &q, &mut inv).unwrap());
    }

    #[test]
    fn test_infty_norm() {
        let q = Modulus::new(&[17]).unwrap();
        // centered magnitudes: 3, 17-15=2, 0, 8
        let p = BigPoly::from_u64_coeffs(&[3, 15, 0, 8], 64);
        assert_eq!(
            poly_infty_norm_coeffmod(&p, &q),
            crate::uint::BigUInt::from(8)
        );
    }
}
