//! Evaluation keys for relinearization.

use std::sync::Arc;

use fv_math::rq::PolyArray;
use fv_math::serialize::{read_big_poly, write_i32, ByteReader};
use fv_traits::{DeserializeUsingParameters, Serialize};

use crate::parameters::FvParameters;
use crate::{Error, Result};

/// Evaluation keys: for each power i they hold the base-2^w decomposition
/// keys of s^{i+2}, as a pair of polynomial arrays of length
/// ceil(log2 q / w).
///
/// Relinearizing a size-s ciphertext down by one needs the keys for power
/// s - 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationKeys {
    pub(crate) hash: [u8; 32],
    pub(crate) decomposition_bit_count: usize,
    pub(crate) keys: Vec<(PolyArray, PolyArray)>,
}

impl EvaluationKeys {
    /// The number of powers covered: keys exist for s^2 .. s^{size + 1}.
    pub fn size(&self) -> usize {
        self.keys.len()
    }

    /// The decomposition bit count w these keys were generated with.
    pub fn decomposition_bit_count(&self) -> usize {
        self.decomposition_bit_count
    }

    /// The key pair for power index i (covering s^{i+2}).
    pub fn key(&self, index: usize) -> Option<&(PolyArray, PolyArray)> {
        self.keys.get(index)
    }

    /// The hash of the parameters these keys belong to.
    pub fn hash_block(&self) -> &[u8; 32] {
        &self.hash
    }

    pub(crate) fn matches(&self, params: &FvParameters) -> Result<()> {
        if self.hash != *params.hash_block() {
            return Err(Error::invalid(
                "evaluation keys were generated under different encryption parameters",
            ));
        }
        Ok(())
    }
}

impl Serialize for EvaluationKeys {
    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.hash);
        write_i32(&mut out, self.decomposition_bit_count);
        write_i32(&mut out, self.keys.len());
        for (ek0, ek1) in &self.keys {
            write_i32(&mut out, ek0.size());
            for j in 0..ek0.size() {
                // Each digit is stored as a two-polynomial ciphertext.
                write_i32(&mut out, 2);
                out.extend_from_slice(&ek0[j].to_bytes());
                out.extend_from_slice(&ek1[j].to_bytes());
            }
        }
        out
    }
}

impl DeserializeUsingParameters for EvaluationKeys {
    type Error = Error;
    type Parameters = FvParameters;

    fn from_bytes(bytes: &[u8], params: &Arc<FvParameters>) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let hash: [u8; 32] = reader
            .read_bytes(32)?
            .try_into()
            .expect("fixed-size read");
        let decomposition_bit_count = reader.read_i32()?;
        let outer = reader.read_i32()?;
        let mut keys = Vec::with_capacity(outer);
        for _ in 0..outer {
            let inner = reader.read_i32()?;
            let mut ek0 = PolyArray::empty();
            let mut ek1 = PolyArray::empty();
            for _ in 0..inner {
                let pair_size = reader.read_i32()?;
                if pair_size != 2 {
                    return Err(Error::Serialization(
                        "evaluation key entry is not a pair".to_string(),
                    ));
                }
                ek0.push(read_big_poly(&mut reader)?)?;
                ek1.push(read_big_poly(&mut reader)?)?;
            }
            keys.push((ek0, ek1));
        }
        if reader.remaining() != 0 {
            return Err(Error::Serialization("trailing bytes".to_string()));
        }
        let out = Self {
            hash,
            decomposition_bit_count,
            keys,
        };
        out.matches(params)?;
        Ok(out)
    }
}
