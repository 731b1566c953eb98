//! Multi-limb unsigned integers.

pub mod ops;

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Mul, MulAssign, Shl, ShlAssign, Shr, ShrAssign, Sub, SubAssign};

use num_bigint::BigUint as NumBigUint;
use zeroize::Zeroize;

use crate::{Error, Result};
use fv_util::div_ceil;
use self::ops::BITS_PER_U64;

/// A fixed-width unsigned integer stored as a little-endian array of 64-bit
/// limbs.
///
/// The declared bit width bounds the value: limbs above the declared width
/// are always zero, and `significant_bit_count` never exceeds the width.
/// Assignment-style operations resize the value as the original library's
/// integers do: a sum is one bit wider than its widest operand, a product as
/// wide as the sum of its operand widths.
#[derive(Clone, Default)]
pub struct BigUInt {
    bit_count: usize,
    value: Vec<u64>,
}

impl BigUInt {
    /// A zero value of the given bit width.
    pub fn new(bit_count: usize) -> Self {
        Self {
            bit_count,
            value: vec![0; div_ceil(bit_count, BITS_PER_U64)],
        }
    }

    /// A zero value of zero width.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Build a value of the given bit width from a `u64`.
    ///
    /// The scalar is truncated if the width is smaller than its significant
    /// bits.
    pub fn from_u64(bit_count: usize, value: u64) -> Self {
        let mut out = Self::new(bit_count.max(1));
        if !out.value.is_empty() {
            out.value[0] = value;
        }
        out.filter_to_width();
        out
    }

    /// Parse a hexadecimal string (no prefix) into a value of exactly the
    /// significant width.
    pub fn from_hex(hex: &str) -> Result<Self> {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::invalid("not a hexadecimal string"));
        }
        let big = NumBigUint::parse_bytes(hex.as_bytes(), 16)
            .ok_or_else(|| Error::invalid("not a hexadecimal string"))?;
        Ok(Self::from_biguint(&big))
    }

    /// Build from a `num_bigint::BigUint`, sized to the significant width.
    pub fn from_biguint(big: &NumBigUint) -> Self {
        let value = big.to_u64_digits();
        let bit_count = big.bits() as usize;
        Self { bit_count, value }
    }

    /// Convert into a `num_bigint::BigUint`.
    pub fn to_biguint(&self) -> NumBigUint {
        let mut b = NumBigUint::default();
        for &l in self.value.iter().rev() {
            b = (b << BITS_PER_U64) | NumBigUint::from(l);
        }
        b
    }

    /// The declared bit width.
    pub fn bit_count(&self) -> usize {
        self.bit_count
    }

    /// The number of limbs backing the declared width.
    pub fn uint64_count(&self) -> usize {
        self.value.len()
    }

    /// The number of significant bits of the current value.
    pub fn significant_bit_count(&self) -> usize {
        ops::significant_bit_count_uint(&self.value)
    }

    /// Returns true iff the value is zero.
    pub fn is_zero(&self) -> bool {
        ops::is_zero_uint(&self.value)
    }

    /// Set the value to zero, keeping the width.
    pub fn set_zero(&mut self) {
        ops::set_zero_uint(&mut self.value);
    }

    /// The backing limbs.
    pub fn as_slice(&self) -> &[u64] {
        &self.value
    }

    /// The backing limbs, mutably. Writing bits above the declared width is
    /// the caller's bug; `resize` first when in doubt.
    pub fn as_mut_slice(&mut self) -> &mut [u64] {
        &mut self.value
    }

    /// The low 64 bits of the value.
    pub fn low_u64(&self) -> u64 {
        self.value.first().copied().unwrap_or(0)
    }

    /// Change the declared width, truncating the value if it shrinks.
    pub fn resize(&mut self, bit_count: usize) {
        self.value.resize(div_ceil(bit_count, BITS_PER_U64), 0);
        self.bit_count = bit_count;
        self.filter_to_width();
    }

    /// Shrink the declared width to the significant width.
    pub fn trim(&mut self) {
        let bits = self.significant_bit_count();
        self.resize(bits.max(1));
    }

    /// `self` raised to `exponent`, exact width.
    pub fn pow_u64(&self, exponent: u64) -> Self {
        Self::from_biguint(&self.to_biguint().pow(exponent as u32))
    }

    fn filter_to_width(&mut self) {
        ops::filter_highbits_uint(&mut self.value, self.bit_count);
    }
}

impl fmt::Debug for BigUInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BigUInt({self})")
    }
}

impl fmt::Display for BigUInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.to_biguint())
    }
}

impl PartialEq for BigUInt {
    fn eq(&self, other: &Self) -> bool {
        ops::compare_uint_uint(&self.value, &other.value) == Ordering::Equal
    }
}

impl Eq for BigUInt {}

impl PartialOrd for BigUInt {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BigUInt {
    fn cmp(&self, other: &Self) -> Ordering {
        ops::compare_uint_uint(&self.value, &other.value)
    }
}

impl PartialEq<u64> for BigUInt {
    fn eq(&self, other: &u64) -> bool {
        ops::is_equal_uint(&self.value, *other) || (self.value.is_empty() && *other == 0)
    }
}

impl PartialOrd<u64> for BigUInt {
    fn partial_cmp(&self, other: &u64) -> Option<Ordering> {
        Some(ops::compare_uint_uint(&self.value, &[*other]))
    }
}

impl From<u64> for BigUInt {
    fn from(value: u64) -> Self {
        Self::from_u64(BITS_PER_U64, value)
    }
}

impl Add<&BigUInt> for &BigUInt {
    type Output = BigUInt;

    fn add(self, rhs: &BigUInt) -> BigUInt {
        let bits = self.significant_bit_count().max(rhs.significant_bit_count()) + 1;
        let mut out = BigUInt::new(bits.max(1));
        ops::set_uint_uint(&self.value, &mut out.value);
        let rhs_sig = ops::significant_uint64_count_uint(&rhs.value);
        ops::add_uint_uint_inplace(&mut out.value, &rhs.value[..rhs_sig]);
        out.filter_to_width();
        out
    }
}

impl Add<u64> for &BigUInt {
    type Output = BigUInt;

    fn add(self, rhs: u64) -> BigUInt {
        self + &BigUInt::from(rhs)
    }
}

impl AddAssign<&BigUInt> for BigUInt {
    fn add_assign(&mut self, rhs: &BigUInt) {
        *self = &*self + rhs;
    }
}

impl Sub<&BigUInt> for &BigUInt {
    type Output = BigUInt;

    /// Subtraction; underflow is a caller bug and aborts in debug mode.
    fn sub(self, rhs: &BigUInt) -> BigUInt {
        let mut out = BigUInt::new(self.significant_bit_count().max(1));
        ops::set_uint_uint(&self.value, &mut out.value);
        let rhs_sig = ops::significant_uint64_count_uint(&rhs.value);
        debug_assert!(rhs_sig <= out.value.len());
        let borrow = ops::sub_uint_uint_inplace(&mut out.value, &rhs.value[..rhs_sig]);
        debug_assert_eq!(borrow, 0);
        out
    }
}

impl SubAssign<&BigUInt> for BigUInt {
    fn sub_assign(&mut self, rhs: &BigUInt) {
        *self = &*self - rhs;
    }
}

impl Mul<&BigUInt> for &BigUInt {
    type Output = BigUInt;

    fn mul(self, rhs: &BigUInt) -> BigUInt {
        let bits = self.significant_bit_count() + rhs.significant_bit_count();
        let mut out = BigUInt::new(bits.max(1));
        ops::multiply_uint_uint(&self.value, &rhs.value, &mut out.value);
        out.filter_to_width();
        out
    }
}

impl Mul<u64> for &BigUInt {
    type Output = BigUInt;

    fn mul(self, rhs: u64) -> BigUInt {
        self * &BigUInt::from(rhs)
    }
}

impl MulAssign<&BigUInt> for BigUInt {
    fn mul_assign(&mut self, rhs: &BigUInt) {
        *self = &*self * rhs;
    }
}

impl MulAssign<u64> for BigUInt {
    fn mul_assign(&mut self, rhs: u64) {
        *self = &*self * rhs;
    }
}

impl Shl<usize> for &BigUInt {
    type Output = BigUInt;

    fn shl(self, shift: usize) -> BigUInt {
        let mut out = BigUInt::new(self.significant_bit_count() + shift);
        ops::set_uint_uint(&self.value, &mut out.value);
        ops::left_shift_uint_inplace(&mut out.value, shift);
        out
    }
}

impl ShlAssign<usize> for BigUInt {
    fn shl_assign(&mut self, shift: usize) {
        *self = &*self << shift;
    }
}

impl Shr<usize> for &BigUInt {
    type Output = BigUInt;

    fn shr(self, shift: usize) -> BigUInt {
        let mut out = self.clone();
        ops::right_shift_uint_inplace(&mut out.value, shift);
        out
    }
}

impl ShrAssign<usize> for BigUInt {
    fn shr_assign(&mut self, shift: usize) {
        ops::right_shift_uint_inplace(&mut self.value, shift);
    }
}

impl Zeroize for BigUInt {
    fn zeroize(&mut self) {
        self.value.zeroize();
        self.bit_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::BigUInt;
    use num_bigint::BigUint as NumBigUint;

    #[test]
    fn test_construction() {
        let x = BigUInt::new(128);
        assert_eq!(x.bit_count(), 128);
        assert_eq!(x.uint64_count(), 2);
        assert!(x.is_zero());
        assert_eq!(x.significant_bit_count(), 0);

        let y = BigUInt::from_u64(64, 0x1234);
        assert_eq!(y.significant_bit_count(), 13);
        assert_eq!(y.low_u64(), 0x1234);
    }

    #[test]
    fn test_from_hex() {
        let q = BigUInt::from_hex("FFFFFFFFFFFC001").unwrap();
        assert_eq!(q.significant_bit_count(), 60);
        assert_eq!(q.low_u64(), (1u64 << 60) - (1 << 14) + 1);

        let wide = BigUInt::from_hex("FFFFFFFFFFFFFFFFFFFFFFFFC0001").unwrap();
        assert_eq!(wide.significant_bit_count(), 116);
        assert_eq!(wide.uint64_count(), 2);

        assert!(BigUInt::from_hex("").is_err());
        assert!(BigUInt::from_hex("XYZ").is_err());
    }

    #[test]
    fn test_arithmetic_matches_bigint() {
        let a = BigUInt::from_hex("FFFFFFFFFFFFFFFFFFFFFFFFC0001").unwrap();
        let b = BigUInt::from_hex("123456789ABCDEF0123").unwrap();

        assert_eq!((&a + &b).to_biguint(), a.to_biguint() + b.to_biguint());
        assert_eq!((&a - &b).to_biguint(), a.to_biguint() - b.to_biguint());
        assert_eq!((&a * &b).to_biguint(), a.to_biguint() * b.to_biguint());
        assert_eq!((&a << 13).to_biguint(), a.to_biguint() << 13);
        assert_eq!((&a >> 13).to_biguint(), a.to_biguint() >> 13);
        assert_eq!((&a * 1000u64).to_biguint(), a.to_biguint() * 1000u64);
    }

    #[test]
    fn test_comparisons() {
        let a = BigUInt::from_u64(64, 5);
        let mut b = BigUInt::from_u64(256, 5);
        assert_eq!(a, b);
        assert!(a == 5u64);
        b += &BigUInt::from(1);
        assert!(a < b);
        assert!(b > 5u64);
    }

    #[test]
    fn test_resize_truncates() {
        let mut a = BigUInt::from_hex("FFFFFFFFFFFFFFFFFFFFFFFFC0001").unwrap();
        a.resize(16);
        assert_eq!(a.low_u64(), 1);
        a.resize(128);
        assert_eq!(a.to_biguint(), NumBigUint::from(1u64));
    }
}
