//! Ciphertext type of the FV scheme.

use std::sync::Arc;

use fv_math::rq::PolyArray;
use fv_math::serialize::{read_poly_array, ByteReader};
use fv_traits::{DeserializeUsingParameters, Serialize};

use crate::parameters::FvParameters;
use crate::{Error, Result};

/// A ciphertext: an ordered sequence of at least two polynomials in R_q.
///
/// The size grows under multiplication and shrinks under relinearization.
/// A ciphertext is tied to the parameters that produced it through the
/// parameter hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ciphertext {
    pub(crate) hash: [u8; 32],
    pub(crate) polys: PolyArray,
    pub(crate) ntt_form: bool,
}

impl Ciphertext {
    /// The number of polynomials.
    pub fn size(&self) -> usize {
        self.polys.size()
    }

    /// Whether the ciphertext currently lives in the NTT domain.
    pub fn is_ntt_form(&self) -> bool {
        self.ntt_form
    }

    /// The underlying polynomials.
    pub fn polys(&self) -> &PolyArray {
        &self.polys
    }

    /// The hash of the parameters this ciphertext belongs to.
    pub fn hash_block(&self) -> &[u8; 32] {
        &self.hash
    }

    pub(crate) fn new(params: &FvParameters, polys: PolyArray, ntt_form: bool) -> Self {
        Self {
            hash: *params.hash_block(),
            polys,
            ntt_form,
        }
    }

    // Entry validation shared by every public operation that consumes a
    // ciphertext.
    pub(crate) fn validate(&self, params: &FvParameters, name: &str) -> Result<()> {
        if self.hash != *params.hash_block() {
            return Err(Error::InvalidArgument(format!(
                "{name} was produced under different encryption parameters"
            )));
        }
        if self.size() < 2 {
            return Err(Error::InvalidArgument(format!(
                "{name} must contain at least two polynomials"
            )));
        }
        if self.polys.coeff_count() != params.degree()
            || self.polys.coeff_bit_count() != params.coeff_bit_count()
        {
            return Err(Error::InvalidArgument(format!(
                "{name} has the wrong polynomial shape"
            )));
        }
        for poly in self.polys.iter() {
            if !poly.are_coefficients_less_than(params.coeff_mod.as_slice()) {
                return Err(Error::InvalidArgument(format!(
                    "{name} has a coefficient outside the coefficient modulus"
                )));
            }
        }
        Ok(())
    }
}

impl Serialize for Ciphertext {
    fn to_bytes(&self) -> Vec<u8> {
        self.polys.to_bytes()
    }
}

impl DeserializeUsingParameters for Ciphertext {
    type Error = Error;
    type Parameters = FvParameters;

    fn from_bytes(bytes: &[u8], params: &Arc<FvParameters>) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let polys = read_poly_array(&mut reader).map_err(Error::from)?;
        if reader.remaining() != 0 {
            return Err(Error::Serialization("trailing bytes".to_string()));
        }
        let ct = Ciphertext::new(params, polys, false);
        ct.validate(params, "deserialized ciphertext")?;
        Ok(ct)
    }
}
