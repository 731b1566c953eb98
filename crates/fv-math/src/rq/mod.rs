//! Polynomials with multi-limb coefficients and arithmetic over
//! R_q = Z_q[x]/(x^n + 1).

mod arith;

pub use arith::{
    add_poly_poly_coeffmod, divide_poly_poly_coeffmod, dyadic_product_coeffmod, modulo_poly_inplace,
    multiply_poly_poly, multiply_poly_scalar_coeffmod, negate_poly_coeffmod,
    nonfft_multiply_poly_poly_polymod_coeffmod, poly_infty_norm_coeffmod, sub_poly_poly_coeffmod,
    try_invert_poly_coeffmod,
};

use ndarray::Array2;
use zeroize::Zeroize;

use crate::uint::ops::{self, BITS_PER_U64};
use crate::uint::BigUInt;
use crate::{Error, Result};
use fv_util::div_ceil;

/// A dense polynomial: `coeff_count` coefficients of `coeff_bit_count` bits
/// each, stored row-major as little-endian limbs.
///
/// Coefficients are semantic integers, not residues, unless the operation
/// acting on the polynomial names a modulus.
#[derive(Debug, Clone, Default)]
pub struct BigPoly {
    coeff_count: usize,
    coeff_bit_count: usize,
    data: Array2<u64>,
}

impl BigPoly {
    /// A zero polynomial of the given shape.
    pub fn new(coeff_count: usize, coeff_bit_count: usize) -> Self {
        Self {
            coeff_count,
            coeff_bit_count,
            data: Array2::zeros((coeff_count, div_ceil(coeff_bit_count, BITS_PER_U64))),
        }
    }

    /// Build a polynomial from `u64` coefficients, lowest degree first.
    pub fn from_u64_coeffs(coeffs: &[u64], coeff_bit_count: usize) -> Self {
        let mut out = Self::new(coeffs.len(), coeff_bit_count.max(1));
        for (i, &c) in coeffs.iter().enumerate() {
            out.set_coeff_u64(i, c);
        }
        out
    }

    /// The number of coefficients.
    pub fn coeff_count(&self) -> usize {
        self.coeff_count
    }

    /// The declared per-coefficient bit width.
    pub fn coeff_bit_count(&self) -> usize {
        self.coeff_bit_count
    }

    /// Limbs per coefficient.
    pub fn coeff_uint64_count(&self) -> usize {
        self.data.ncols()
    }

    /// The limbs of coefficient `i`.
    pub fn coeff(&self, i: usize) -> &[u64] {
        self.data.row(i).to_slice().unwrap()
    }

    /// The limbs of coefficient `i`, mutably.
    pub fn coeff_mut(&mut self, i: usize) -> &mut [u64] {
        self.data.row_mut(i).into_slice().unwrap()
    }

    /// Coefficient `i` as a [`BigUInt`] of the declared width.
    pub fn coeff_big_uint(&self, i: usize) -> BigUInt {
        let mut out = BigUInt::new(self.coeff_bit_count.max(1));
        ops::set_uint_uint(self.coeff(i), out.as_mut_slice());
        out
    }

    /// Overwrite coefficient `i` with a scalar.
    pub fn set_coeff_u64(&mut self, i: usize, value: u64) {
        let limbs = self.coeff_mut(i);
        ops::set_zero_uint(limbs);
        if !limbs.is_empty() {
            limbs[0] = value;
        }
    }

    /// Overwrite coefficient `i`, truncating to the declared width.
    pub fn set_coeff(&mut self, i: usize, value: &BigUInt) {
        let bits = self.coeff_bit_count;
        let limbs = self.coeff_mut(i);
        ops::set_uint_uint(value.as_slice(), limbs);
        ops::filter_highbits_uint(limbs, bits);
    }

    /// Number of coefficients up to and including the highest nonzero one.
    pub fn significant_coeff_count(&self) -> usize {
        for i in (0..self.coeff_count).rev() {
            if !ops::is_zero_uint(self.coeff(i)) {
                return i + 1;
            }
        }
        0
    }

    /// The largest significant bit count over all coefficients.
    pub fn significant_coeff_bit_count(&self) -> usize {
        (0..self.coeff_count)
            .map(|i| ops::significant_bit_count_uint(self.coeff(i)))
            .max()
            .unwrap_or(0)
    }

    /// Returns true iff every coefficient is zero.
    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|&v| v == 0)
    }

    /// Zero all coefficients, keeping the shape.
    pub fn set_zero(&mut self) {
        self.data.fill(0);
    }

    /// Reshape, preserving coefficient values that still fit. Values wider
    /// than the new coefficient width are truncated.
    pub fn resize(&mut self, coeff_count: usize, coeff_bit_count: usize) {
        if coeff_count == self.coeff_count && coeff_bit_count == self.coeff_bit_count {
            return;
        }
        let mut out = Self::new(coeff_count, coeff_bit_count);
        for i in 0..coeff_count.min(self.coeff_count) {
            let bits = coeff_bit_count;
            let dst = out.coeff_mut(i);
            ops::set_uint_uint(self.coeff(i), dst);
            ops::filter_highbits_uint(dst, bits);
        }
        *self = out;
    }

    /// The whole coefficient matrix as one flat limb slice.
    pub fn as_slice(&self) -> &[u64] {
        self.data.as_slice().unwrap()
    }

    /// The whole coefficient matrix as one flat mutable limb slice.
    pub fn as_mut_slice(&mut self) -> &mut [u64] {
        self.data.as_slice_mut().unwrap()
    }

    /// Returns true iff every coefficient is strictly below `bound`.
    pub fn are_coefficients_less_than(&self, bound: &[u64]) -> bool {
        (0..self.coeff_count)
            .all(|i| ops::compare_uint_uint(self.coeff(i), bound) == std::cmp::Ordering::Less)
    }
}

impl PartialEq for BigPoly {
    /// Semantic equality: equal coefficient values up to zero-extension.
    fn eq(&self, other: &Self) -> bool {
        let sig = self.significant_coeff_count();
        if sig != other.significant_coeff_count() {
            return false;
        }
        (0..sig).all(|i| {
            ops::compare_uint_uint(self.coeff(i), other.coeff(i)) == std::cmp::Ordering::Equal
        })
    }
}

impl Eq for BigPoly {}

impl Zeroize for BigPoly {
    fn zeroize(&mut self) {
        self.data.iter_mut().for_each(|v| *v = 0);
    }
}

/// A sequence of polynomials sharing one shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolyArray {
    polys: Vec<BigPoly>,
}

impl PolyArray {
    /// An array of `size` zero polynomials of the given shape.
    pub fn new(size: usize, coeff_count: usize, coeff_bit_count: usize) -> Self {
        Self {
            polys: (0..size)
                .map(|_| BigPoly::new(coeff_count, coeff_bit_count))
                .collect(),
        }
    }

    /// An empty array.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from polynomials; they must all share one shape.
    pub fn from_polys(polys: Vec<BigPoly>) -> Result<Self> {
        if let Some(first) = polys.first() {
            let (cc, cb) = (first.coeff_count(), first.coeff_bit_count());
            if polys
                .iter()
                .any(|p| p.coeff_count() != cc || p.coeff_bit_count() != cb)
            {
                return Err(Error::invalid("polynomials have mismatched shapes"));
            }
        }
        Ok(Self { polys })
    }

    /// The number of polynomials.
    pub fn size(&self) -> usize {
        self.polys.len()
    }

    /// The common coefficient count (0 when empty).
    pub fn coeff_count(&self) -> usize {
        self.polys.first().map_or(0, BigPoly::coeff_count)
    }

    /// The common coefficient bit width (0 when empty).
    pub fn coeff_bit_count(&self) -> usize {
        self.polys.first().map_or(0, BigPoly::coeff_bit_count)
    }

    /// Reshape to `size` polynomials of the given shape, keeping surviving
    /// values.
    pub fn resize(&mut self, size: usize, coeff_count: usize, coeff_bit_count: usize) {
        self.polys
            .iter_mut()
            .for_each(|p| p.resize(coeff_count, coeff_bit_count));
        self.polys
            .resize_with(size, || BigPoly::new(coeff_count, coeff_bit_count));
    }

    /// Append a polynomial of the matching shape.
    pub fn push(&mut self, poly: BigPoly) -> Result<()> {
        if self.size() != 0
            && (poly.coeff_count() != self.coeff_count()
                || poly.coeff_bit_count() != self.coeff_bit_count())
        {
            return Err(Error::invalid("polynomial shape mismatch"));
        }
        self.polys.push(poly);
        Ok(())
    }

    /// Drop the last polynomial.
    pub fn pop(&mut self) -> Option<BigPoly> {
        self.polys.pop()
    }

    /// Zero every polynomial.
    pub fn set_zero(&mut self) {
        self.polys.iter_mut().for_each(BigPoly::set_zero);
    }

    /// Iterate over the polynomials.
    pub fn iter(&self) -> std::slice::Iter<'_, BigPoly> {
        self.polys.iter()
    }

    /// Iterate mutably over the polynomials.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, BigPoly> {
        self.polys.iter_mut()
    }
}

impl std::ops::Index<usize> for PolyArray {
    type Output = BigPoly;

    fn index(&self, index: usize) -> &BigPoly {
        &self.polys[index]
    }
}

impl std::ops::IndexMut<usize> for PolyArray {
    fn index_mut(&mut self, index: usize) -> &mut BigPoly {
        &mut self.polys[index]
    }
}

impl Zeroize for PolyArray {
    fn zeroize(&mut self) {
        self.polys.iter_mut().for_each(Zeroize::zeroize);
    }
}

/// The polynomial modulus x^n + 1 with n a power of two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolyModulus {
    poly: BigPoly,
    degree: usize,
    coeff_count_power: usize,
    is_one_zero_one: bool,
}

impl PolyModulus {
    /// Wrap a polynomial modulus.
    ///
    /// The polynomial must be monic of power-of-two degree. The
    /// `is_one_zero_one` flag records whether it is exactly 1·x^n + 1,
    /// which enables the fast monic reduction.
    pub fn new(poly: &BigPoly) -> Result<Self> {
        let sig = poly.significant_coeff_count();
        if sig < 2 {
            return Err(Error::invalid("polynomial modulus must have positive degree"));
        }
        let degree = sig - 1;
        if !degree.is_power_of_two() {
            return Err(Error::invalid(
                "polynomial modulus degree must be a power of two",
            ));
        }
        let is_one_zero_one = ops::is_equal_uint(poly.coeff(0), 1)
            && ops::is_equal_uint(poly.coeff(degree), 1)
            && (1..degree).all(|i| ops::is_zero_uint(poly.coeff(i)));

        Ok(Self {
            poly: poly.clone(),
            degree,
            coeff_count_power: degree.trailing_zeros() as usize,
            is_one_zero_one,
        })
    }

    /// The canonical modulus 1·x^n + 1 for a power-of-two degree.
    pub fn one_zero_one(degree: usize) -> Result<Self> {
        if !degree.is_power_of_two() {
            return Err(Error::invalid(
                "polynomial modulus degree must be a power of two",
            ));
        }
        let mut poly = BigPoly::new(degree + 1, 1);
        poly.set_coeff_u64(0, 1);
        poly.set_coeff_u64(degree, 1);
        Self::new(&poly)
    }

    /// The wrapped polynomial.
    pub fn poly(&self) -> &BigPoly {
        &self.poly
    }

    /// The degree n.
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// log2 of the degree.
    pub fn coeff_count_power(&self) -> usize {
        self.coeff_count_power
    }

    /// Whether the modulus is exactly 1·x^n + 1.
    pub fn is_one_zero_one(&self) -> bool {
        self.is_one_zero_one
    }
}

#[cfg(test)]
mod tests {
    use super::{BigPoly, PolyArray, PolyModulus};
    use crate::uint::BigUInt;

    #[test]
    fn test_big_poly_shape() {
        let p = BigPoly::new(4, 130);
        assert_eq!(p.coeff_count(), 4);
        assert_eq!(p.coeff_bit_count(), 130);
        assert_eq!(p.coeff_uint64_count(), 3);
        assert!(p.is_zero());
        assert_eq!(p.significant_coeff_count(), 0);
    }

    #[test]
    fn test_coeff_roundtrip() {
        let mut p = BigPoly::new(3, 70);
        p.set_coeff(1, &BigUInt::from_hex("123456789ABCDEF00").unwrap());
        assert_eq!(
            p.coeff_big_uint(1),
            BigUInt::from_hex("123456789ABCDEF00").unwrap()
        );
        assert_eq!(p.significant_coeff_count(), 2);
        assert_eq!(p.significant_coeff_bit_count(), 65);

        // Truncation to the declared width.
        let mut narrow = BigPoly::new(3, 8);
        narrow.set_coeff(0, &BigUInt::from_hex("1FF").unwrap());
        assert_eq!(narrow.coeff_big_uint(0), BigUInt::from(0xFF));
    }

    #[test]
    fn test_resize_preserves_values() {
        let mut p = BigPoly::from_u64_coeffs(&[1, 2, 3], 64);
        p.resize(5, 128);
        assert_eq!(p.coeff_big_uint(2), BigUInt::from(3));
        assert_eq!(p.significant_coeff_count(), 3);
        p.resize(2, 64);
        assert_eq!(p.coeff_big_uint(1), BigUInt::from(2));
        assert_eq!(p.coeff_count(), 2);
    }

    #[test]
    fn test_semantic_equality() {
        let a = BigPoly::from_u64_coeffs(&[1, 2, 0, 0], 64);
        let b = BigPoly::from_u64_coeffs(&[1, 2], 256);
        assert_eq!(a, b);
        let c = BigPoly::from_u64_coeffs(&[1, 3], 64);
        assert_ne!(a, c);
    }

    #[test]
    fn test_poly_array_shape_checks() {
        let mut arr = PolyArray::new(2, 4, 64);
        assert_eq!(arr.size(), 2);
        assert!(arr.push(BigPoly::new(4, 64)).is_ok());
        assert!(arr.push(BigPoly::new(5, 64)).is_err());
        assert!(arr.push(BigPoly::new(4, 65)).is_err());
        arr.resize(1, 4, 64);
        assert_eq!(arr.size(), 1);
    }

    #[test]
    fn test_poly_modulus() {
        let m = PolyModulus::one_zero_one(1024).unwrap();
        assert_eq!(m.degree(), 1024);
        assert_eq!(m.coeff_count_power(), 10);
        assert!(m.is_one_zero_one());

        let mut other = BigPoly::from_u64_coeffs(&[1, 1, 0, 0, 1], 64);
        let m = PolyModulus::new(&other).unwrap();
        assert_eq!(m.degree(), 4);
        assert!(!m.is_one_zero_one());

        let constant = BigPoly::from_u64_coeffs(&[1], 64);
        assert!(PolyModulus::new(&constant).is_err());
        let cubic = BigPoly::from_u64_coeffs(&[1, 0, 0, 1], 64);
        assert!(PolyModulus::new(&cubic).is_err()); // degree 3 is not a power of two
        assert!(PolyModulus::one_zero_one(1000).is_err());
    }
}
