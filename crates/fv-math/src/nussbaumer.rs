//! Nussbaumer negacyclic convolution over wide two's-complement integers.
//!
//! Multiplies length-n polynomials modulo x^n + 1 over the integers without
//! needing roots of unity in the coefficient domain: the polynomial is split
//! into m-coefficient blocks living in Z[Z]/(Z^m + 1), where Z itself is a
//! 2m-th root of unity, so the size-2r transform multiplies by powers of Z,
//! which are just sign-aware cyclic shifts. The block products recurse until
//! a signed schoolbook base case.
//!
//! Coefficients are little-endian two's-complement limb vectors; additions
//! and truncating multiplications wrap, and the one inexact operation (the
//! exact division by the transform length, an arithmetic right shift) is
//! kept exact by running the recursion at a widened internal width.

use crate::rq::BigPoly;
use crate::uint::ops::{
    add_uint_uint_inplace, is_high_bit_set_uint, multiply_uint_uint, negate_uint_inplace,
    right_shift_sign_extend_uint_inplace, set_uint_uint, sub_uint_uint_inplace, BITS_PER_U64,
};
use crate::zq::Modulus;
use crate::{Error, Result};
use fv_util::div_ceil;

/// Negacyclic product of two signed polynomials.
///
/// `operand1` and `operand2` hold n = 2^`coeff_count_power` coefficients of
/// `operand_uint64_count` limbs each, in two's complement. The exact product
/// modulo x^n + 1 is written to `result`, n coefficients of
/// `result_uint64_count` limbs; it must be wide enough to hold the true
/// values.
pub fn nussbaumer_multiply_poly_poly(
    operand1: &[u64],
    operand2: &[u64],
    coeff_count_power: usize,
    operand_uint64_count: usize,
    result_uint64_count: usize,
    result: &mut [u64],
) {
    let n = 1usize << coeff_count_power;
    debug_assert_eq!(operand1.len(), n * operand_uint64_count);
    debug_assert_eq!(operand2.len(), n * operand_uint64_count);
    debug_assert_eq!(result.len(), n * result_uint64_count);

    let w = internal_width(coeff_count_power, operand_uint64_count);
    let a = widen(operand1, operand_uint64_count, w);
    let b = widen(operand2, operand_uint64_count, w);
    let mut wide_result = vec![0u64; n * w];
    negacyclic(&a, &b, coeff_count_power, w, &mut wide_result);
    narrow(&wide_result, w, result_uint64_count, result);
}

/// The three products (a·a, b·b, a·b) modulo x^n + 1, sharing the forward
/// transforms of the two operands. Layout conventions as in
/// [`nussbaumer_multiply_poly_poly`].
#[allow(clippy::too_many_arguments)]
pub fn nussbaumer_cross_multiply_poly_poly(
    operand1: &[u64],
    operand2: &[u64],
    coeff_count_power: usize,
    operand_uint64_count: usize,
    result_uint64_count: usize,
    result_op1_op1: &mut [u64],
    result_op2_op2: &mut [u64],
    result_op1_op2: &mut [u64],
) {
    let n = 1usize << coeff_count_power;
    let w = internal_width(coeff_count_power, operand_uint64_count);
    let a = widen(operand1, operand_uint64_count, w);
    let b = widen(operand2, operand_uint64_count, w);
    let mut aa = vec![0u64; n * w];
    let mut bb = vec![0u64; n * w];
    let mut ab = vec![0u64; n * w];
    cross_negacyclic(&a, &b, coeff_count_power, w, &mut aa, &mut bb, &mut ab);
    narrow(&aa, w, result_uint64_count, result_op1_op1);
    narrow(&bb, w, result_uint64_count, result_op2_op2);
    narrow(&ab, w, result_uint64_count, result_op1_op2);
}

/// Negacyclic product in R_q: convolve over the integers in a wide
/// accumulator, then reduce each coefficient by the scalar modulus with the
/// sign restored.
///
/// Operand coefficients must be residues below q; `result` must be shaped
/// n coefficients by the modulus's limb count.
pub fn nussbaumer_multiply_poly_poly_coeffmod(
    operand1: &BigPoly,
    operand2: &BigPoly,
    coeff_count_power: usize,
    modulus: &Modulus,
    result: &mut BigPoly,
) -> Result<()> {
    let n = 1usize << coeff_count_power;
    let limbs = modulus.uint64_count();
    if operand1.coeff_count() != n || operand2.coeff_count() != n {
        return Err(Error::invalid("operand coefficient count mismatch"));
    }
    if result.coeff_count() != n || result.coeff_uint64_count() < limbs {
        return Err(Error::invalid("result shape mismatch"));
    }

    // Residues are unsigned; one extra zero limb keeps the sign bit clear.
    let op_w = limbs + 1;
    let a = widen_poly_unsigned(operand1, op_w);
    let b = widen_poly_unsigned(operand2, op_w);

    let wide_bits = 2 * modulus.significant_bit_count() + coeff_count_power + 1;
    let wide_w = div_ceil(wide_bits, BITS_PER_U64) + 1;
    let mut wide = vec![0u64; n * wide_w];
    let w = internal_width(coeff_count_power, op_w);
    let wa = widen(&a, op_w, w);
    let wb = widen(&b, op_w, w);
    let mut conv = vec![0u64; n * w];
    negacyclic(&wa, &wb, coeff_count_power, w, &mut conv);
    narrow(&conv, w, wide_w, &mut wide);

    reduce_signed_into(&wide, wide_w, modulus, result)?;
    Ok(())
}

/// Reduce a flat array of signed wide coefficients into a residue
/// polynomial: negative values reduce by their magnitude and re-negate
/// mod q.
pub fn reduce_signed_into(
    wide: &[u64],
    wide_uint64_count: usize,
    modulus: &Modulus,
    result: &mut BigPoly,
) -> Result<()> {
    let limbs = modulus.uint64_count();
    let n = result.coeff_count();
    debug_assert_eq!(wide.len(), n * wide_uint64_count);
    let mut scratch = vec![0u64; wide_uint64_count.max(limbs)];
    let mut reduced = vec![0u64; limbs];
    for i in 0..n {
        let c = &wide[i * wide_uint64_count..(i + 1) * wide_uint64_count];
        let negative = is_high_bit_set_uint(c);
        set_uint_uint(c, &mut scratch);
        if negative {
            negate_uint_inplace(&mut scratch);
        }
        modulus.modulo_uint_inplace(&mut scratch)?;
        if negative {
            modulus.negate_uint_mod(&scratch[..limbs], &mut reduced);
        } else {
            reduced.copy_from_slice(&scratch[..limbs]);
        }
        set_uint_uint(&reduced, result.coeff_mut(i));
    }
    Ok(())
}

// Internal width covering the transform growth (about k bits on the way
// down), the product doubling, and the inverse-side sums before each exact
// division.
fn internal_width(coeff_count_power: usize, operand_uint64_count: usize) -> usize {
    2 * operand_uint64_count + div_ceil(3 * coeff_count_power + 16, BITS_PER_U64)
}

fn widen(values: &[u64], from: usize, to: usize) -> Vec<u64> {
    debug_assert!(to >= from);
    let count = values.len() / from;
    let mut out = vec![0u64; count * to];
    for i in 0..count {
        let src = &values[i * from..(i + 1) * from];
        let dst = &mut out[i * to..i * to + from];
        dst.copy_from_slice(src);
        if is_high_bit_set_uint(src) {
            out[i * to + from..(i + 1) * to].fill(u64::MAX);
        }
    }
    out
}

fn widen_poly_unsigned(poly: &BigPoly, to: usize) -> Vec<u64> {
    let n = poly.coeff_count();
    let mut out = vec![0u64; n * to];
    for i in 0..n {
        let src = poly.coeff(i);
        out[i * to..i * to + src.len().min(to)].copy_from_slice(&src[..src.len().min(to)]);
    }
    out
}

fn narrow(values: &[u64], from: usize, to: usize, result: &mut [u64]) {
    debug_assert!(from >= to);
    let count = values.len() / from;
    for i in 0..count {
        result[i * to..(i + 1) * to].copy_from_slice(&values[i * from..i * from + to]);
    }
}

// Coefficient-wise wrapping block helpers; each block is m coefficients of
// w limbs.

fn sadd_block(a: &mut [u64], b: &[u64], w: usize) {
    debug_assert_eq!(a.len(), b.len());
    for (ac, bc) in a.chunks_mut(w).zip(b.chunks(w)) {
        add_uint_uint_inplace(ac, bc);
    }
}

fn ssub_block(a: &mut [u64], b: &[u64], w: usize) {
    debug_assert_eq!(a.len(), b.len());
    for (ac, bc) in a.chunks_mut(w).zip(b.chunks(w)) {
        sub_uint_uint_inplace(ac, bc);
    }
}

// dst = Z^shift * src in Z[Z]/(Z^m + 1): a cyclic shift with a sign flip on
// wraparound.
fn shift_block(src: &[u64], shift: usize, m: usize, w: usize, dst: &mut [u64]) {
    debug_assert_eq!(src.len(), m * w);
    debug_assert_eq!(dst.len(), m * w);
    let shift = shift % (2 * m);
    for p in 0..m {
        let q = p + shift;
        let pos = q % m;
        let flips = (q / m) % 2 == 1;
        let d = &mut dst[pos * w..(pos + 1) * w];
        d.copy_from_slice(&src[p * w..(p + 1) * w]);
        if flips {
            negate_uint_inplace(d);
        }
    }
}

// Signed truncating product of single coefficients.
fn smul_coeff(a: &[u64], b: &[u64], result: &mut [u64], sa: &mut [u64], sb: &mut [u64]) {
    sa.copy_from_slice(a);
    sb.copy_from_slice(b);
    let neg_a = is_high_bit_set_uint(sa);
    if neg_a {
        negate_uint_inplace(sa);
    }
    let neg_b = is_high_bit_set_uint(sb);
    if neg_b {
        negate_uint_inplace(sb);
    }
    multiply_uint_uint(sa, sb, result);
    if neg_a != neg_b {
        negate_uint_inplace(result);
    }
}

// Signed schoolbook negacyclic product for the base case.
fn schoolbook_negacyclic(a: &[u64], b: &[u64], n: usize, w: usize, result: &mut [u64]) {
    result.fill(0);
    let mut prod = vec![0u64; w];
    let mut sa = vec![0u64; w];
    let mut sb = vec![0u64; w];
    for i in 0..n {
        for j in 0..n {
            smul_coeff(
                &a[i * w..(i + 1) * w],
                &b[j * w..(j + 1) * w],
                &mut prod,
                &mut sa,
                &mut sb,
            );
            let idx = (i + j) % n;
            let target = &mut result[idx * w..(idx + 1) * w];
            if i + j < n {
                add_uint_uint_inplace(target, &prod);
            } else {
                sub_uint_uint_inplace(target, &prod);
            }
        }
    }
}

// Split a length-n polynomial into 2r blocks of m coefficients (upper r
// blocks zero): block i holds the coefficients congruent to i mod r.
fn deinterleave(values: &[u64], r: usize, m: usize, w: usize) -> Vec<u64> {
    let mut out = vec![0u64; 2 * r * m * w];
    for i in 0..r {
        for l in 0..m {
            let src = (l * r + i) * w;
            let dst = (i * m + l) * w;
            out[dst..dst + w].copy_from_slice(&values[src..src + w]);
        }
    }
    out
}

// Size-`nblocks` cyclic FFT over Z[Z]/(Z^m + 1) with root Z^unit,
// decimation in frequency: natural order in, bit-reversed out.
fn fft_forward(data: &mut [u64], nblocks: usize, m: usize, w: usize, unit: usize) {
    let mw = m * w;
    let mut diff = vec![0u64; mw];
    let mut len = nblocks;
    while len >= 2 {
        let half = len / 2;
        let stride = nblocks / len;
        let mut s = 0;
        while s < nblocks {
            for pos in 0..half {
                let bi = (s + pos) * mw;
                let bj = (s + pos + half) * mw;
                let (lo, hi) = data.split_at_mut(bj);
                let u = &mut lo[bi..bi + mw];
                let v = &mut hi[..mw];
                diff.copy_from_slice(u);
                ssub_block(&mut diff, v, w);
                sadd_block(u, v, w);
                shift_block(&diff, unit * pos * stride, m, w, v);
            }
            s += len;
        }
        len = half;
    }
}

// Inverse of [`fft_forward`]: decimation in time, bit-reversed in, natural
// out, then an exact division by `nblocks`.
fn fft_inverse(data: &mut [u64], nblocks: usize, m: usize, w: usize, unit: usize) {
    let mw = m * w;
    let mut twisted = vec![0u64; mw];
    let mut saved = vec![0u64; mw];
    let mut len = 2;
    while len <= nblocks {
        let half = len / 2;
        let stride = nblocks / len;
        let mut s = 0;
        while s < nblocks {
            for pos in 0..half {
                let bi = (s + pos) * mw;
                let bj = (s + pos + half) * mw;
                let (lo, hi) = data.split_at_mut(bj);
                let u = &mut lo[bi..bi + mw];
                let v = &mut hi[..mw];
                // Z^{-j} = -Z^{m - j}; fold the negation into the shift by
                // adding m twice: Z^{2m - j}.
                let back = (2 * m - (unit * pos * stride) % (2 * m)) % (2 * m);
                shift_block(v, back, m, w, &mut twisted);
                saved.copy_from_slice(u);
                sadd_block(u, &twisted, w);
                v.copy_from_slice(&saved);
                ssub_block(v, &twisted, w);
            }
            s += len;
        }
        len *= 2;
    }
    let log = nblocks.trailing_zeros() as usize;
    for c in data.chunks_mut(w) {
        right_shift_sign_extend_uint_inplace(c, log);
    }
}

// Fold the 2r linear-convolution blocks back into r blocks of the result:
// C_i = D_i + Z * D_{i+r}, then re-interleave coefficients.
fn fold_and_interleave(blocks: &[u64], r: usize, m: usize, w: usize, result: &mut [u64]) {
    let mut scratch = vec![0u64; w];
    for i in 0..r {
        for l in 0..m {
            let dst = (l * r + i) * w;
            let base = (i * m + l) * w;
            result[dst..dst + w].copy_from_slice(&blocks[base..base + w]);
            let hi_block = (i + r) * m;
            if l == 0 {
                // Z * Z^{m-1} = -1
                let src = (hi_block + m - 1) * w;
                scratch.copy_from_slice(&blocks[src..src + w]);
                sub_uint_uint_inplace(&mut result[dst..dst + w], &scratch);
            } else {
                let src = (hi_block + l - 1) * w;
                scratch.copy_from_slice(&blocks[src..src + w]);
                add_uint_uint_inplace(&mut result[dst..dst + w], &scratch);
            }
        }
    }
}

fn negacyclic(a: &[u64], b: &[u64], k: usize, w: usize, result: &mut [u64]) {
    let n = 1usize << k;
    if k <= 2 {
        schoolbook_negacyclic(a, b, n, w, result);
        return;
    }
    let half = k / 2;
    let r = 1usize << half;
    let m = n / r;
    let unit = m / r; // Z^unit is a primitive 2r-th root of unity
    let fft = 2 * r;

    let mut ta = deinterleave(a, r, m, w);
    let mut tb = deinterleave(b, r, m, w);
    fft_forward(&mut ta, fft, m, w, unit);
    fft_forward(&mut tb, fft, m, w, unit);

    let mut tc = vec![0u64; fft * m * w];
    let km = k - half;
    for idx in 0..fft {
        let s = idx * m * w;
        let e = s + m * w;
        negacyclic(&ta[s..e], &tb[s..e], km, w, &mut tc[s..e]);
    }

    fft_inverse(&mut tc, fft, m, w, unit);
    fold_and_interleave(&tc, r, m, w, result);
}

fn cross_negacyclic(
    a: &[u64],
    b: &[u64],
    k: usize,
    w: usize,
    aa: &mut [u64],
    bb: &mut [u64],
    ab: &mut [u64],
) {
    let n = 1usize << k;
    if k <= 2 {
        schoolbook_negacyclic(a, a, n, w, aa);
        schoolbook_negacyclic(b, b, n, w, bb);
        schoolbook_negacyclic(a, b, n, w, ab);
        return;
    }
    let half = k / 2;
    let r = 1usize << half;
    let m = n / r;
    let unit = m / r;
    let fft = 2 * r;

    let mut ta = deinterleave(a, r, m, w);
    let mut tb = deinterleave(b, r, m, w);
    fft_forward(&mut ta, fft, m, w, unit);
    fft_forward(&mut tb, fft, m, w, unit);

    let mut taa = vec![0u64; fft * m * w];
    let mut tbb = vec![0u64; fft * m * w];
    let mut tab = vec![0u64; fft * m * w];
    let km = k - half;
    for idx in 0..fft {
        let s = idx * m * w;
        let e = s + m * w;
        cross_negacyclic(
            &ta[s..e],
            &tb[s..e],
            km,
            w,
            &mut taa[s..e],
            &mut tbb[s..e],
            &mut tab[s..e],
        );
    }

    for t in [&mut taa, &mut tbb, &mut tab] {
        fft_inverse(t, fft, m, w, unit);
    }
    fold_and_interleave(&taa, r, m, w, aa);
    fold_and_interleave(&tbb, r, m, w, bb);
    fold_and_interleave(&tab, r, m, w, ab);
}

#[cfg(test)]
mod tests {
    use super::{
        nussbaumer_cross_multiply_poly_poly, nussbaumer_multiply_poly_poly,
        nussbaumer_multiply_poly_poly_coeffmod,
    };
    use crate::rq::{nonfft_multiply_poly_poly_polymod_coeffmod, BigPoly, PolyModulus};
    use crate::uint::ops::negate_uint_inplace;
    use crate::zq::Modulus;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    // Signed schoolbook oracle over i128.
    fn oracle(a: &[i128], b: &[i128]) -> Vec<i128> {
        let n = a.len();
        let mut r = vec![0i128; n];
        for i in 0..n {
            for j in 0..n {
                let p = a[i] * b[j];
                if i + j < n {
                    r[i + j] += p;
                } else {
                    r[(i + j) % n] -= p;
                }
            }
        }
        r
    }

    fn encode(values: &[i128], w: usize) -> Vec<u64> {
        let mut out = vec![0u64; values.len() * w];
        for (i, &v) in values.iter().enumerate() {
            let mag = v.unsigned_abs();
            let c = &mut out[i * w..(i + 1) * w];
            c[0] = mag as u64;
            if w > 1 {
                c[1] = (mag >> 64) as u64;
            }
            if v < 0 {
                negate_uint_inplace(c);
            }
        }
        out
    }

    fn decode(values: &[u64], w: usize) -> Vec<i128> {
        let n = values.len() / w;
        (0..n)
            .map(|i| {
                let c = &values[i * w..(i + 1) * w];
                let negative = c[w - 1] >> 63 == 1;
                let mut limbs = c.to_vec();
                if negative {
                    negate_uint_inplace(&mut limbs);
                }
                let mag = (limbs[0] as u128) | ((limbs.get(1).copied().unwrap_or(0) as u128) << 64);
                if negative {
                    -(mag as i128)
                } else {
                    mag as i128
                }
            })
            .collect()
    }

    #[test]
    fn test_base_case_matches_oracle() {
        let a: Vec<i128> = vec![3, -1, 4, 1];
        let b: Vec<i128> = vec![-5, 9, 2, -6];
        let fa = encode(&a, 2);
        let fb = encode(&b, 2);
        let mut r = vec![0u64; 4 * 3];
        nussbaumer_multiply_poly_poly(&fa, &fb, 2, 2, 3, &mut r);
        assert_eq!(decode(&r, 3), oracle(&a, &b));
    }

    #[test]
    fn test_recursive_sizes_match_oracle() {
        for power in [3usize, 4, 5, 6, 7] {
            let n = 1usize << power;
            let mut rng = ChaCha8Rng::from_seed([power as u8; 32]);
            let a: Vec<i128> = (0..n).map(|_| rng.gen_range(-1000..1000)).collect();
            let b: Vec<i128> = (0..n).map(|_| rng.gen_range(-1000..1000)).collect();
            let fa = encode(&a, 2);
            let fb = encode(&b, 2);
            let mut r = vec![0u64; n * 2];
            nussbaumer_multiply_poly_poly(&fa, &fb, power, 2, 2, &mut r);
            assert_eq!(decode(&r, 2), oracle(&a, &b), "power {power}");
        }
    }

    #[test]
    fn test_cross_multiply_matches_individual_products() {
        let power = 4usize;
        let n = 1usize << power;
        let mut rng = ChaCha8Rng::from_seed([42u8; 32]);
        let a: Vec<i128> = (0..n).map(|_| rng.gen_range(-500..500)).collect();
        let b: Vec<i128> = (0..n).map(|_| rng.gen_range(-500..500)).collect();
        let fa = encode(&a, 2);
        let fb = encode(&b, 2);
        let mut aa = vec![0u64; n * 2];
        let mut bb = vec![0u64; n * 2];
        let mut ab = vec![0u64; n * 2];
        nussbaumer_cross_multiply_poly_poly(&fa, &fb, power, 2, 2, &mut aa, &mut bb, &mut ab);
        assert_eq!(decode(&aa, 2), oracle(&a, &a));
        assert_eq!(decode(&bb, 2), oracle(&b, &b));
        assert_eq!(decode(&ab, 2), oracle(&a, &b));
    }

    #[test]
    fn test_coeffmod_matches_schoolbook() {
        for (q_limbs, power) in [(vec![27u64], 2usize), (vec![65537], 4), (vec![(1u64 << 60) - (1 << 14) + 1], 5)] {
            let q = Modulus::new(&q_limbs).unwrap();
            let n = 1usize << power;
            let pm = PolyModulus::one_zero_one(n).unwrap();
            let mut rng = ChaCha8Rng::from_seed([power as u8; 32]);
            let ac: Vec<u64> = (0..n).map(|_| rng.gen::<u64>() % q_limbs[0]).collect();
            let bc: Vec<u64> = (0..n).map(|_| rng.gen::<u64>() % q_limbs[0]).collect();
            let a = BigPoly::from_u64_coeffs(&ac, 64);
            let b = BigPoly::from_u64_coeffs(&bc, 64);

            let mut fast = BigPoly::new(n, q.significant_bit_count());
            nussbaumer_multiply_poly_poly_coeffmod(&a, &b, power, &q, &mut fast).unwrap();

            let mut school = BigPoly::new(n, q.significant_bit_count());
            nonfft_multiply_poly_poly_polymod_coeffmod(&a, &b, &pm, &q, &mut school).unwrap();
            assert_eq!(fast, school, "q {:?} power {}", q_limbs, power);
        }
    }

    #[test]
    fn test_coeffmod_multilimb() {
        use crate::uint::BigUInt;
        let q = Modulus::from_big_uint(&BigUInt::from_hex("FFFFFFFFFFFFFFFFFFFFFFFFC0001").unwrap())
            .unwrap();
        let power = 4usize;
        let n = 1usize << power;
        let pm = PolyModulus::one_zero_one(n).unwrap();
        let mut rng = ChaCha8Rng::from_seed([99u8; 32]);
        let mut a = BigPoly::new(n, q.significant_bit_count());
        let mut b = BigPoly::new(n, q.significant_bit_count());
        for i in 0..n {
            let mut limbs: Vec<u64> = (0..q.uint64_count()).map(|_| rng.gen()).collect();
            q.modulo_uint_inplace(&mut limbs).unwrap();
            a.coeff_mut(i).copy_from_slice(&limbs);
            let mut limbs: Vec<u64> = (0..q.uint64_count()).map(|_| rng.gen()).collect();
            q.modulo_uint_inplace(&mut limbs).unwrap();
            b.coeff_mut(i).copy_from_slice(&limbs);
        }

        let mut fast = BigPoly::new(n, q.significant_bit_count());
        nussbaumer_multiply_poly_poly_coeffmod(&a, &b, power, &q, &mut fast).unwrap();
        let mut school = BigPoly::new(n, q.significant_bit_count());
        nonfft_multiply_poly_poly_polymod_coeffmod(&a, &b, &pm, &q, &mut school).unwrap();
        assert_eq!(fast, school);
    }
}
