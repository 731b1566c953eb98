//! Two-modulus CRT composition.

use crate::uint::ops::{multiply_uint_uint, set_uint_uint, significant_bit_count_uint};
use crate::zq::Modulus;
use crate::{Error, Result};

/// Combines residues mod q and mod q' into the unique representative in
/// [0, q * q'), for coprime q and q'.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrtComposer {
    modulus: Modulus,
    aux_modulus: Modulus,
    // q^{-1} mod q'
    inv_modulus_mod_aux: Vec<u64>,
    mod_product: Vec<u64>,
    mod_product_bit_count: usize,
}

impl CrtComposer {
    /// Precompute the composition constants.
    ///
    /// Fails with `InvariantViolation` when q and q' are not coprime.
    pub fn generate(modulus: &Modulus, aux_modulus: &Modulus) -> Result<Self> {
        let aux_limbs = aux_modulus.uint64_count();

        // Reduce q mod q' and invert it there.
        let mut q_mod_aux = vec![0u64; modulus.uint64_count().max(aux_limbs)];
        set_uint_uint(modulus.as_slice(), &mut q_mod_aux);
        aux_modulus.modulo_uint_inplace(&mut q_mod_aux)?;
        let mut inv = vec![0u64; aux_limbs];
        if !aux_modulus.try_invert_uint_mod(&q_mod_aux[..aux_limbs], &mut inv) {
            return Err(Error::InvariantViolation(
                "moduli are not coprime".to_string(),
            ));
        }

        let mut mod_product = vec![0u64; modulus.uint64_count() + aux_limbs];
        multiply_uint_uint(modulus.as_slice(), aux_modulus.as_slice(), &mut mod_product);
        let mod_product_bit_count = significant_bit_count_uint(&mod_product);

        Ok(Self {
            modulus: modulus.clone(),
            aux_modulus: aux_modulus.clone(),
            inv_modulus_mod_aux: inv,
            mod_product,
            mod_product_bit_count,
        })
    }

    /// The product q * q'.
    pub fn mod_product(&self) -> &[u64] {
        &self.mod_product
    }

    /// Significant bits of q * q'.
    pub fn mod_product_bit_count(&self) -> usize {
        self.mod_product_bit_count
    }

    /// Limbs of q * q'.
    pub fn mod_product_uint64_count(&self) -> usize {
        self.mod_product.len()
    }

    /// Compose `value_mod_q` (below q) and `value_mod_aux` (below q') into
    /// `result`, which must have [`Self::mod_product_uint64_count`] limbs.
    ///
    /// result = x1 + q * ((x2 - x1) * q^{-1} mod q')
    pub fn compose(&self, value_mod_q: &[u64], value_mod_aux: &[u64], result: &mut [u64]) {
        debug_assert_eq!(result.len(), self.mod_product.len());
        let aux_limbs = self.aux_modulus.uint64_count();

        // (x2 - x1) mod q'
        let mut x1_mod_aux = vec![0u64; value_mod_q.len().max(aux_limbs)];
        set_uint_uint(value_mod_q, &mut x1_mod_aux);
        self.aux_modulus.modulo_uint_inplace(&mut x1_mod_aux).unwrap();
        let mut diff = vec![0u64; aux_limbs];
        self.aux_modulus
            .sub_uint_uint_mod(value_mod_aux, &x1_mod_aux[..aux_limbs], &mut diff);

        // * q^{-1} mod q'
        let mut factor = vec![0u64; aux_limbs];
        self.aux_modulus
            .multiply_uint_uint_mod(&diff, &self.inv_modulus_mod_aux, &mut factor);

        // x1 + q * factor
        multiply_uint_uint(self.modulus.as_slice(), &factor, result);
        crate::uint::ops::add_uint_uint_inplace(result, value_mod_q);
    }
}
