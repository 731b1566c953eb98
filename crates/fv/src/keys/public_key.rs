//! Public keys for the FV scheme.

use std::sync::Arc;

use fv_math::rq::PolyArray;
use fv_math::serialize::{read_poly_array, ByteReader};
use fv_traits::{DeserializeUsingParameters, Serialize};

use crate::parameters::FvParameters;
use crate::{Error, Result};

/// The public key: the pair (pk0, pk1) = (-(a s + e), a) in R_q, in NTT
/// form when the parameters enable the NTT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    pub(crate) hash: [u8; 32],
    pub(crate) pk: PolyArray,
}

impl PublicKey {
    /// The hash of the parameters this key belongs to.
    pub fn hash_block(&self) -> &[u8; 32] {
        &self.hash
    }

    pub(crate) fn matches(&self, params: &FvParameters) -> Result<()> {
        if self.hash != *params.hash_block() {
            return Err(Error::invalid(
                "public key was generated under different encryption parameters",
            ));
        }
        if self.pk.size() != 2
            || self.pk.coeff_count() != params.degree()
            || self.pk.coeff_bit_count() != params.coeff_bit_count()
        {
            return Err(Error::invalid("public key has the wrong shape"));
        }
        Ok(())
    }
}

impl Serialize for PublicKey {
    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.hash);
        out.extend_from_slice(&self.pk.to_bytes());
        out
    }
}

impl DeserializeUsingParameters for PublicKey {
    type Error = Error;
    type Parameters = FvParameters;

    fn from_bytes(bytes: &[u8], params: &Arc<FvParameters>) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let hash: [u8; 32] = reader
            .read_bytes(32)?
            .try_into()
            .expect("fixed-size read");
        let pk = read_poly_array(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(Error::Serialization("trailing bytes".to_string()));
        }
        let key = Self { hash, pk };
        key.matches(params)?;
        Ok(key)
    }
}
