//! Galois keys for rotations.

use std::collections::BTreeMap;

use fv_math::rq::PolyArray;

use crate::parameters::FvParameters;
use crate::{Error, Result};

/// Key-switching keys for the ring automorphisms x -> x^g: one
/// decomposition-key pair per supported Galois element.
///
/// Row rotations compose the keys for the elements 3^{2^i}; the column
/// swap uses the element 2n - 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GaloisKeys {
    pub(crate) hash: [u8; 32],
    pub(crate) decomposition_bit_count: usize,
    pub(crate) keys: BTreeMap<u64, (PolyArray, PolyArray)>,
}

impl GaloisKeys {
    /// The decomposition bit count w these keys were generated with.
    pub fn decomposition_bit_count(&self) -> usize {
        self.decomposition_bit_count
    }

    /// Whether a key for the given Galois element is present.
    pub fn has_key(&self, galois_elt: u64) -> bool {
        self.keys.contains_key(&galois_elt)
    }

    /// The key pair for a Galois element.
    pub fn key(&self, galois_elt: u64) -> Option<&(PolyArray, PolyArray)> {
        self.keys.get(&galois_elt)
    }

    /// The hash of the parameters these keys belong to.
    pub fn hash_block(&self) -> &[u8; 32] {
        &self.hash
    }

    pub(crate) fn matches(&self, params: &FvParameters) -> Result<()> {
        if self.hash != *params.hash_block() {
            return Err(Error::invalid(
                "Galois keys were generated under different encryption parameters",
            ));
        }
        Ok(())
    }
}
