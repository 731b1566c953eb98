//! Negacyclic number-theoretic transform over multi-limb moduli.
//!
//! The transform is the Harvey butterfly with delayed reduction:
//! intermediate values may exceed q but stay below 4q, and a final pass
//! normalizes into [0, q). Twiddle factors are powers of a minimal
//! primitive 2n-th root of unity stored in bit-reversed order, each with a
//! scaled companion floor(W * 2^{64L} / q) driving the lazy multiplication.

use ndarray::Array2;
use rand::RngCore;

use crate::uint::ops::{
    add_uint_uint_inplace, divide_uint_uint_inplace, is_greater_than_or_equal_uint_uint,
    multiply_truncate_uint_uint, multiply_uint_uint, set_uint_uint, sub_uint_uint_inplace,
    BITS_PER_U64,
};
use crate::zq::Modulus;

/// Precomputed tables for the negacyclic NTT of a fixed size over a fixed
/// modulus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NttTables {
    coeff_count: usize,
    coeff_count_power: usize,
    modulus: Modulus,
    two_times_modulus: Vec<u64>,
    root: Vec<u64>,
    root_powers: Array2<u64>,
    scaled_root_powers: Array2<u64>,
    inv_root_powers: Array2<u64>,
    scaled_inv_root_powers: Array2<u64>,
    inv_degree: Vec<u64>,
    scaled_inv_degree: Vec<u64>,
}

impl NttTables {
    /// Build tables for a transform of size 2^`coeff_count_power` mod q.
    ///
    /// Returns `None` when q has no primitive 2n-th root of unity or when
    /// its limb allocation leaves less than two bits of headroom for the
    /// lazy butterflies.
    pub fn new<R: RngCore + ?Sized>(
        coeff_count_power: usize,
        modulus: &Modulus,
        rng: &mut R,
    ) -> Option<Self> {
        if coeff_count_power == 0 {
            return None;
        }
        let n = 1usize << coeff_count_power;
        let limbs = modulus.uint64_count();
        if modulus.significant_bit_count() + 2 > limbs * BITS_PER_U64 {
            return None;
        }

        let mut root = vec![0u64; limbs];
        if !modulus.try_minimal_primitive_root(2 * n, rng, &mut root) {
            return None;
        }

        // Forward twiddles: psi^i stored at the bit-reversed index.
        let mut root_powers = Array2::zeros((n, limbs));
        let mut power = vec![0u64; limbs];
        power[0] = 1;
        for i in 0..n {
            let row = root_powers.row_mut(reverse_bits(i, coeff_count_power));
            row.into_slice().unwrap().copy_from_slice(&power);
            let p = power.clone();
            modulus.multiply_uint_uint_mod(&p, &root, &mut power);
        }
        let mut scaled_root_powers = Array2::zeros((n, limbs));
        for i in 0..n {
            let w = root_powers.row(i).to_slice().unwrap().to_vec();
            scale_for_harvey(
                &w,
                modulus,
                scaled_root_powers.row_mut(i).into_slice().unwrap(),
            );
        }

        // Inverse twiddles in consumption order: the Gentleman-Sande pass
        // undoes the forward stages last to first, so stage h of the
        // inverse uses the inverses of root_powers[h..2h].
        let mut inv_root_powers = Array2::zeros((n, limbs));
        let mut scaled_inv_root_powers = Array2::zeros((n, limbs));
        let mut idx = 0usize;
        let mut h = n / 2;
        while h >= 1 {
            for i in 0..h {
                let w = root_powers.row(h + i).to_slice().unwrap().to_vec();
                let mut w_inv = vec![0u64; limbs];
                if !modulus.try_invert_uint_mod(&w, &mut w_inv) {
                    return None;
                }
                inv_root_powers
                    .row_mut(idx)
                    .into_slice()
                    .unwrap()
                    .copy_from_slice(&w_inv);
                scale_for_harvey(
                    &w_inv,
                    modulus,
                    scaled_inv_root_powers.row_mut(idx).into_slice().unwrap(),
                );
                idx += 1;
            }
            if h == 1 {
                break;
            }
            h /= 2;
        }

        let mut degree = vec![0u64; limbs];
        degree[0] = n as u64;
        let mut inv_degree = vec![0u64; limbs];
        if !modulus.try_invert_uint_mod(&degree, &mut inv_degree) {
            return None;
        }
        let mut scaled_inv_degree = vec![0u64; limbs];
        scale_for_harvey(&inv_degree, modulus, &mut scaled_inv_degree);

        let mut two_times_modulus = vec![0u64; limbs];
        set_uint_uint(modulus.as_slice(), &mut two_times_modulus);
        add_uint_uint_inplace(&mut two_times_modulus, modulus.as_slice());

        Some(Self {
            coeff_count: n,
            coeff_count_power,
            modulus: modulus.clone(),
            two_times_modulus,
            root,
            root_powers,
            scaled_root_powers,
            inv_root_powers,
            scaled_inv_root_powers,
            inv_degree,
            scaled_inv_degree,
        })
    }

    /// The transform size n.
    pub fn coeff_count(&self) -> usize {
        self.coeff_count
    }

    /// log2 of the transform size.
    pub fn coeff_count_power(&self) -> usize {
        self.coeff_count_power
    }

    /// The modulus of the transform.
    pub fn modulus(&self) -> &Modulus {
        &self.modulus
    }

    /// The minimal primitive 2n-th root of unity the tables are built on.
    pub fn root(&self) -> &[u64] {
        &self.root
    }
}

/// In-place forward negacyclic NTT of `values`, a flat array of n
/// coefficients of the modulus's limb count, each below q.
pub fn ntt_negacyclic_harvey(values: &mut [u64], tables: &NttTables) {
    let n = tables.coeff_count;
    let l = tables.modulus.uint64_count();
    debug_assert_eq!(values.len(), n * l);

    let mut lazy = LazyMul::new(l);
    let two_q = &tables.two_times_modulus;

    let mut t = n;
    let mut m = 1;
    while m < n {
        t >>= 1;
        for i in 0..m {
            let w = tables.root_powers.row(m + i);
            let ws = tables.scaled_root_powers.row(m + i);
            let w = w.to_slice().unwrap();
            let ws = ws.to_slice().unwrap();
            let j1 = 2 * i * t;
            for j in j1..j1 + t {
                let (lo, hi) = values.split_at_mut((j + t) * l);
                let x = &mut lo[j * l..(j + 1) * l];
                let y = &mut hi[..l];
                // x, y < 4q on entry.
                if is_greater_than_or_equal_uint_uint(x, two_q) {
                    sub_uint_uint_inplace(x, two_q);
                }
                lazy.mul_root(y, w, ws, &tables.modulus);
                // y' = x + 2q - W*y, x' = x + W*y; both stay below 4q.
                set_uint_uint(x, y);
                add_uint_uint_inplace(y, two_q);
                sub_uint_uint_inplace(y, &lazy.result);
                add_uint_uint_inplace(x, &lazy.result);
            }
        }
        m <<= 1;
    }

    // Normalize from [0, 4q) into [0, q).
    for j in 0..n {
        let x = &mut values[j * l..(j + 1) * l];
        if is_greater_than_or_equal_uint_uint(x, two_q) {
            sub_uint_uint_inplace(x, two_q);
        }
        if is_greater_than_or_equal_uint_uint(x, tables.modulus.as_slice()) {
            sub_uint_uint_inplace(x, tables.modulus.as_slice());
        }
    }
}

/// In-place inverse negacyclic NTT of `values`; the output coefficients
/// are reduced into [0, q).
pub fn inverse_ntt_negacyclic_harvey(values: &mut [u64], tables: &NttTables) {
    let n = tables.coeff_count;
    let l = tables.modulus.uint64_count();
    debug_assert_eq!(values.len(), n * l);

    let mut lazy = LazyMul::new(l);
    let two_q = &tables.two_times_modulus;
    let mut scratch = vec![0u64; l];

    let mut t = 1usize;
    let mut m = n;
    let mut root_index = 0usize;
    while m > 1 {
        let h = m >> 1;
        let mut j1 = 0usize;
        for _ in 0..h {
            let w = tables.inv_root_powers.row(root_index);
            let ws = tables.scaled_inv_root_powers.row(root_index);
            let w = w.to_slice().unwrap();
            let ws = ws.to_slice().unwrap();
            root_index += 1;
            for j in j1..j1 + t {
                let (lo, hi) = values.split_at_mut((j + t) * l);
                let x = &mut lo[j * l..(j + 1) * l];
                let y = &mut hi[..l];
                // x, y < 2q on entry.
                // scratch = x + 2q - y, the butterfly difference.
                set_uint_uint(x, &mut scratch);
                add_uint_uint_inplace(&mut scratch, two_q);
                sub_uint_uint_inplace(&mut scratch, y);
                // x' = x + y, kept below 2q.
                add_uint_uint_inplace(x, y);
                if is_greater_than_or_equal_uint_uint(x, two_q) {
                    sub_uint_uint_inplace(x, two_q);
                }
                // y' = W^{-1} * (x - y), below 2q.
                lazy.mul_root(&scratch, w, ws, &tables.modulus);
                y.copy_from_slice(&lazy.result);
            }
            j1 += 2 * t;
        }
        t <<= 1;
        m = h;
    }

    // Fold in n^{-1} and reduce into [0, q).
    for j in 0..n {
        let x = &mut values[j * l..(j + 1) * l];
        lazy.mul_root(x, &tables.inv_degree, &tables.scaled_inv_degree, &tables.modulus);
        x.copy_from_slice(&lazy.result);
        if is_greater_than_or_equal_uint_uint(x, tables.modulus.as_slice()) {
            sub_uint_uint_inplace(x, tables.modulus.as_slice());
        }
    }
}

// Scratch state for the lazy Harvey multiplication
// W*y - floor(W_scaled*y / 2^{64L}) * q, whose result lies in [0, 2q) for
// any y below 2^{64L}.
struct LazyMul {
    wide: Vec<u64>,
    q_hat_q: Vec<u64>,
    result: Vec<u64>,
}

impl LazyMul {
    fn new(limbs: usize) -> Self {
        Self {
            wide: vec![0; 2 * limbs],
            q_hat_q: vec![0; limbs],
            result: vec![0; limbs],
        }
    }

    fn mul_root(&mut self, y: &[u64], w: &[u64], w_scaled: &[u64], modulus: &Modulus) {
        let l = y.len();
        multiply_uint_uint(w_scaled, y, &mut self.wide);
        let q_hat = &self.wide[l..];
        multiply_truncate_uint_uint(q_hat, modulus.as_slice(), &mut self.q_hat_q);
        multiply_truncate_uint_uint(y, w, &mut self.result);
        sub_uint_uint_inplace(&mut self.result, &self.q_hat_q);
    }
}

// result = floor(w * 2^{64L} / q), the Harvey companion of a twiddle.
fn scale_for_harvey(w: &[u64], modulus: &Modulus, result: &mut [u64]) {
    let l = modulus.uint64_count();
    let mut numerator = vec![0u64; 2 * l];
    numerator[l..].copy_from_slice(&w[..l]);
    let mut quotient = vec![0u64; 2 * l];
    divide_uint_uint_inplace(&mut numerator, modulus.as_slice(), &mut quotient);
    set_uint_uint(&quotient[..l], result);
}

fn reverse_bits(value: usize, bits: usize) -> usize {
    debug_assert!(bits >= 1);
    value.reverse_bits() >> (usize::BITS as usize - bits)
}
