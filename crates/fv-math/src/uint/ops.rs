//! Primitives on little-endian `u64` limb slices.
//!
//! All functions operate on caller-supplied slices with explicit lengths.
//! Unless noted, operands and results must not alias; in-place variants are
//! provided where the callers need them. Values are unsigned except for the
//! two's-complement helpers used by the wide-integer convolution.

use std::cmp::Ordering;

/// Bits per limb.
pub const BITS_PER_U64: usize = 64;

/// Zero a limb slice.
pub fn set_zero_uint(value: &mut [u64]) {
    value.fill(0);
}

/// Copy `src` into `dst`, zero-extending or truncating to `dst`'s length.
pub fn set_uint_uint(src: &[u64], dst: &mut [u64]) {
    let n = src.len().min(dst.len());
    dst[..n].copy_from_slice(&src[..n]);
    dst[n..].fill(0);
}

/// Returns true iff the value is zero.
pub fn is_zero_uint(value: &[u64]) -> bool {
    value.iter().all(|&v| v == 0)
}

/// Returns true iff the value equals the given scalar.
pub fn is_equal_uint(value: &[u64], scalar: u64) -> bool {
    !value.is_empty() && value[0] == scalar && value[1..].iter().all(|&v| v == 0)
}

/// Compare two values of possibly different lengths.
pub fn compare_uint_uint(a: &[u64], b: &[u64]) -> Ordering {
    let mut i = a.len().max(b.len());
    while i > 0 {
        i -= 1;
        let ai = a.get(i).copied().unwrap_or(0);
        let bi = b.get(i).copied().unwrap_or(0);
        match ai.cmp(&bi) {
            Ordering::Equal => {}
            ord => return ord,
        }
    }
    Ordering::Equal
}

/// Returns true iff `a >= b`.
pub fn is_greater_than_or_equal_uint_uint(a: &[u64], b: &[u64]) -> bool {
    compare_uint_uint(a, b) != Ordering::Less
}

/// Number of significant bits (0 for the zero value).
pub fn significant_bit_count_uint(value: &[u64]) -> usize {
    for (i, &v) in value.iter().enumerate().rev() {
        if v != 0 {
            return i * BITS_PER_U64 + (BITS_PER_U64 - v.leading_zeros() as usize);
        }
    }
    0
}

/// Number of significant limbs (0 for the zero value).
pub fn significant_uint64_count_uint(value: &[u64]) -> usize {
    for (i, &v) in value.iter().enumerate().rev() {
        if v != 0 {
            return i + 1;
        }
    }
    0
}

/// Returns true iff the given bit is set. Bits beyond the slice read as 0.
pub fn is_bit_set_uint(value: &[u64], bit: usize) -> bool {
    value
        .get(bit / BITS_PER_U64)
        .is_some_and(|&v| (v >> (bit % BITS_PER_U64)) & 1 == 1)
}

/// Set the given bit. The bit must be inside the slice.
pub fn set_bit_uint(value: &mut [u64], bit: usize) {
    value[bit / BITS_PER_U64] |= 1u64 << (bit % BITS_PER_U64);
}

/// Returns true iff the top bit of the slice is set (two's-complement sign).
pub fn is_high_bit_set_uint(value: &[u64]) -> bool {
    debug_assert!(!value.is_empty());
    value[value.len() - 1] >> (BITS_PER_U64 - 1) == 1
}

/// Zero every bit at position `bit_count` and above.
pub fn filter_highbits_uint(value: &mut [u64], bit_count: usize) {
    let limb = bit_count / BITS_PER_U64;
    let rem = bit_count % BITS_PER_U64;
    if limb >= value.len() {
        return;
    }
    if rem != 0 {
        value[limb] &= (1u64 << rem) - 1;
        value[limb + 1..].fill(0);
    } else {
        value[limb..].fill(0);
    }
}

/// `result = a + b`; returns the carry out. `b` may be shorter than `a` and
/// is zero-extended; `result` must have `a`'s length.
pub fn add_uint_uint(a: &[u64], b: &[u64], result: &mut [u64]) -> u64 {
    debug_assert_eq!(a.len(), result.len());
    debug_assert!(b.len() <= a.len());
    let mut carry = 0u64;
    for i in 0..a.len() {
        let bi = b.get(i).copied().unwrap_or(0);
        let t = (a[i] as u128) + (bi as u128) + (carry as u128);
        result[i] = t as u64;
        carry = (t >> BITS_PER_U64) as u64;
    }
    carry
}

/// `a += b` in place; returns the carry out. `b` is zero-extended.
pub fn add_uint_uint_inplace(a: &mut [u64], b: &[u64]) -> u64 {
    debug_assert!(b.len() <= a.len());
    let mut carry = 0u64;
    for i in 0..a.len() {
        let bi = b.get(i).copied().unwrap_or(0);
        let t = (a[i] as u128) + (bi as u128) + (carry as u128);
        a[i] = t as u64;
        carry = (t >> BITS_PER_U64) as u64;
    }
    carry
}

/// `a += scalar` in place; returns the carry out.
pub fn add_uint_u64_inplace(a: &mut [u64], scalar: u64) -> u64 {
    let mut carry = scalar;
    for limb in a.iter_mut() {
        if carry == 0 {
            return 0;
        }
        let t = (*limb as u128) + (carry as u128);
        *limb = t as u64;
        carry = (t >> BITS_PER_U64) as u64;
    }
    carry
}

/// `result = a - b`; returns the borrow out. `b` is zero-extended; `result`
/// must have `a`'s length.
pub fn sub_uint_uint(a: &[u64], b: &[u64], result: &mut [u64]) -> u64 {
    debug_assert_eq!(a.len(), result.len());
    debug_assert!(b.len() <= a.len());
    let mut borrow = 0u64;
    for i in 0..a.len() {
        let bi = b.get(i).copied().unwrap_or(0);
        let (t, b1) = a[i].overflowing_sub(bi);
        let (t, b2) = t.overflowing_sub(borrow);
        result[i] = t;
        borrow = (b1 | b2) as u64;
    }
    borrow
}

/// `a -= b` in place; returns the borrow out. `b` is zero-extended.
pub fn sub_uint_uint_inplace(a: &mut [u64], b: &[u64]) -> u64 {
    debug_assert!(b.len() <= a.len());
    let mut borrow = 0u64;
    for i in 0..a.len() {
        let bi = b.get(i).copied().unwrap_or(0);
        let (t, b1) = a[i].overflowing_sub(bi);
        let (t, b2) = t.overflowing_sub(borrow);
        a[i] = t;
        borrow = (b1 | b2) as u64;
    }
    borrow
}

/// Two's-complement negation in place.
pub fn negate_uint_inplace(value: &mut [u64]) {
    let mut carry = 1u64;
    for limb in value.iter_mut() {
        let t = (!*limb as u128) + (carry as u128);
        *limb = t as u64;
        carry = (t >> BITS_PER_U64) as u64;
    }
}

/// Shift left in place; vacated bits are zero, bits shifted past the top
/// are dropped. Shifts of the full width or more zero the value.
pub fn left_shift_uint_inplace(value: &mut [u64], shift: usize) {
    let n = value.len();
    if shift >= n * BITS_PER_U64 {
        value.fill(0);
        return;
    }
    let limbs = shift / BITS_PER_U64;
    let bits = shift % BITS_PER_U64;
    if limbs > 0 {
        for i in (limbs..n).rev() {
            value[i] = value[i - limbs];
        }
        value[..limbs].fill(0);
    }
    if bits > 0 {
        for i in (limbs..n).rev() {
            let low = if i > limbs {
                value[i - 1] >> (BITS_PER_U64 - bits)
            } else {
                0
            };
            value[i] = (value[i] << bits) | low;
        }
    }
}

/// Logical shift right in place.
pub fn right_shift_uint_inplace(value: &mut [u64], shift: usize) {
    let n = value.len();
    if shift >= n * BITS_PER_U64 {
        value.fill(0);
        return;
    }
    let limbs = shift / BITS_PER_U64;
    let bits = shift % BITS_PER_U64;
    if limbs > 0 {
        for i in 0..n - limbs {
            value[i] = value[i + limbs];
        }
        value[n - limbs..].fill(0);
    }
    if bits > 0 {
        for i in 0..n - limbs {
            let high = if i + 1 < n - limbs {
                value[i + 1] << (BITS_PER_U64 - bits)
            } else {
                0
            };
            value[i] = (value[i] >> bits) | high;
        }
    }
}

/// Arithmetic (sign-extending) shift right in place.
pub fn right_shift_sign_extend_uint_inplace(value: &mut [u64], shift: usize) {
    let n = value.len();
    let negative = is_high_bit_set_uint(value);
    if shift >= n * BITS_PER_U64 {
        value.fill(if negative { u64::MAX } else { 0 });
        return;
    }
    let limbs = shift / BITS_PER_U64;
    let bits = shift % BITS_PER_U64;
    let fill = if negative { u64::MAX } else { 0 };
    if limbs > 0 {
        for i in 0..n - limbs {
            value[i] = value[i + limbs];
        }
        value[n - limbs..].fill(fill);
    }
    if bits > 0 {
        for i in 0..n - limbs {
            let high = if i + 1 < n {
                value[i + 1] << (BITS_PER_U64 - bits)
            } else {
                fill << (BITS_PER_U64 - bits)
            };
            value[i] = (value[i] >> bits) | high;
        }
    }
}

/// `result = (value + 1) / 2`, rounding half up. `result` must have
/// `value`'s length; the carry of the increment is folded into the shift.
pub fn half_round_up_uint(value: &[u64], result: &mut [u64]) {
    debug_assert_eq!(value.len(), result.len());
    result.copy_from_slice(value);
    let carry = add_uint_u64_inplace(result, 1);
    right_shift_uint_inplace(result, 1);
    if carry != 0 {
        let top = result.len() - 1;
        result[top] |= 1u64 << (BITS_PER_U64 - 1);
    }
}

/// `result = a * b`, the exact product truncated to `result`'s length.
/// `result` must not alias the operands.
pub fn multiply_uint_uint(a: &[u64], b: &[u64], result: &mut [u64]) {
    result.fill(0);
    for (i, &ai) in a.iter().enumerate() {
        if i >= result.len() || ai == 0 {
            continue;
        }
        let mut carry = 0u64;
        let mut k = i;
        for &bj in b.iter() {
            if k >= result.len() {
                break;
            }
            let t = (ai as u128) * (bj as u128) + (result[k] as u128) + (carry as u128);
            result[k] = t as u64;
            carry = (t >> BITS_PER_U64) as u64;
            k += 1;
        }
        while carry != 0 && k < result.len() {
            let t = (result[k] as u128) + (carry as u128);
            result[k] = t as u64;
            carry = (t >> BITS_PER_U64) as u64;
            k += 1;
        }
    }
}

/// `result = a * b` for a scalar `b`, truncated to `result`'s length.
pub fn multiply_uint_u64(a: &[u64], b: u64, result: &mut [u64]) {
    result.fill(0);
    let mut carry = 0u64;
    for i in 0..result.len() {
        let ai = a.get(i).copied().unwrap_or(0);
        let t = (ai as u128) * (b as u128) + (carry as u128);
        result[i] = t as u64;
        carry = (t >> BITS_PER_U64) as u64;
    }
}

/// `result = a * b` truncated to the common operand length.
pub fn multiply_truncate_uint_uint(a: &[u64], b: &[u64], result: &mut [u64]) {
    debug_assert_eq!(a.len(), result.len());
    multiply_uint_uint(a, b, result);
}

/// Shift-subtract long division: `quotient = numerator / denominator` and
/// `numerator` becomes the remainder. The denominator must be nonzero and
/// `quotient` must have the numerator's length. This is the one primitive
/// that allocates scratch.
pub fn divide_uint_uint_inplace(numerator: &mut [u64], denominator: &[u64], quotient: &mut [u64]) {
    debug_assert_eq!(numerator.len(), quotient.len());
    debug_assert!(!is_zero_uint(denominator));
    set_zero_uint(quotient);

    let num_bits = significant_bit_count_uint(numerator);
    let den_bits = significant_bit_count_uint(denominator);
    if num_bits < den_bits {
        return;
    }

    let mut shifted = vec![0u64; numerator.len()];
    set_uint_uint(denominator, &mut shifted);
    let mut shift = num_bits - den_bits;
    left_shift_uint_inplace(&mut shifted, shift);

    loop {
        if is_greater_than_or_equal_uint_uint(numerator, &shifted) {
            sub_uint_uint_inplace(numerator, &shifted);
            set_bit_uint(quotient, shift);
        }
        if shift == 0 {
            break;
        }
        shift -= 1;
        right_shift_uint_inplace(&mut shifted, 1);
    }
}
