//! Secret keys for the FV scheme.

use std::sync::Arc;

use zeroize::{Zeroize, ZeroizeOnDrop};

use fv_math::rq::BigPoly;
use fv_math::serialize::{read_big_poly, ByteReader};
use fv_traits::{DeserializeUsingParameters, Serialize};

use crate::parameters::FvParameters;
use crate::{Error, Result};

/// The secret key: a single polynomial with ternary coefficients, stored
/// as positive residues mod q, in NTT form when the parameters enable the
/// NTT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretKey {
    pub(crate) hash: [u8; 32],
    pub(crate) s: BigPoly,
}

impl SecretKey {
    /// The hash of the parameters this key belongs to.
    pub fn hash_block(&self) -> &[u8; 32] {
        &self.hash
    }

    pub(crate) fn matches(&self, params: &FvParameters) -> Result<()> {
        if self.hash != *params.hash_block() {
            return Err(Error::invalid(
                "secret key was generated under different encryption parameters",
            ));
        }
        Ok(())
    }
}

impl Zeroize for SecretKey {
    fn zeroize(&mut self) {
        self.s.zeroize();
    }
}

impl ZeroizeOnDrop for SecretKey {}

impl Serialize for SecretKey {
    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.hash);
        out.extend_from_slice(&self.s.to_bytes());
        out
    }
}

impl DeserializeUsingParameters for SecretKey {
    type Error = Error;
    type Parameters = FvParameters;

    fn from_bytes(bytes: &[u8], params: &Arc<FvParameters>) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let hash: [u8; 32] = reader
            .read_bytes(32)?
            .try_into()
            .expect("fixed-size read");
        let s = read_big_poly(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(Error::Serialization("trailing bytes".to_string()));
        }
        let key = Self { hash, s };
        key.matches(params)?;
        Ok(key)
    }
}
