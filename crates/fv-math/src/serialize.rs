//! Binary serialization of math values.
//!
//! All integers are little-endian; sizes are 32-bit signed. A `BigUInt` is
//! its bit count followed by its limbs; a `BigPoly` is its coefficient
//! count and coefficient bit count followed by the row-major limbs; a
//! `PolyArray` is its size followed by its polynomials.

use fv_traits::{Deserialize, Serialize};

use crate::rq::{BigPoly, PolyArray};
use crate::uint::ops::BITS_PER_U64;
use crate::uint::BigUInt;
use crate::{Error, Result};
use fv_util::div_ceil;

/// Incremental little-endian reader over a byte slice.
#[derive(Debug)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Wrap a byte slice.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// The number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        if self.remaining() < count {
            return Err(Error::Serialization("unexpected end of input".to_string()));
        }
        let out = &self.bytes[self.pos..self.pos + count];
        self.pos += count;
        Ok(out)
    }

    /// Read a little-endian i32, rejecting negative values.
    pub fn read_i32(&mut self) -> Result<usize> {
        let raw = i32::from_le_bytes(self.take(4)?.try_into().unwrap());
        usize::try_from(raw).map_err(|_| Error::Serialization("negative size field".to_string()))
    }

    /// Read a little-endian u64.
    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    /// Read a little-endian f64.
    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    /// Read `count` little-endian u64 limbs.
    pub fn read_limbs(&mut self, count: usize) -> Result<Vec<u64>> {
        (0..count).map(|_| self.read_u64()).collect()
    }

    /// Read a fixed-size byte block.
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        Ok(self.take(count)?.to_vec())
    }
}

/// Append a little-endian i32 size field.
pub fn write_i32(out: &mut Vec<u8>, value: usize) {
    out.extend_from_slice(&(value as i32).to_le_bytes());
}

/// Append a little-endian u64.
pub fn write_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Append a little-endian f64.
pub fn write_f64(out: &mut Vec<u8>, value: f64) {
    write_u64(out, value.to_bits());
}

impl Serialize for BigUInt {
    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + 8 * self.uint64_count());
        write_i32(&mut out, self.bit_count());
        for &limb in self.as_slice() {
            write_u64(&mut out, limb);
        }
        out
    }
}

impl Deserialize for BigUInt {
    type Error = Error;

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let out = read_big_uint(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(Error::Serialization("trailing bytes".to_string()));
        }
        Ok(out)
    }
}

/// Read one `BigUInt` from a reader (for embedding in larger layouts).
pub fn read_big_uint(reader: &mut ByteReader<'_>) -> Result<BigUInt> {
    let bit_count = reader.read_i32()?;
    let limbs = reader.read_limbs(div_ceil(bit_count, BITS_PER_U64))?;
    let mut out = BigUInt::new(bit_count);
    out.as_mut_slice().copy_from_slice(&limbs);
    Ok(out)
}

impl Serialize for BigPoly {
    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + 8 * self.as_slice().len());
        write_i32(&mut out, self.coeff_count());
        write_i32(&mut out, self.coeff_bit_count());
        for &limb in self.as_slice() {
            write_u64(&mut out, limb);
        }
        out
    }
}

impl Deserialize for BigPoly {
    type Error = Error;

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let out = read_big_poly(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(Error::Serialization("trailing bytes".to_string()));
        }
        Ok(out)
    }
}

/// Read one `BigPoly` from a reader (for embedding in larger layouts).
pub fn read_big_poly(reader: &mut ByteReader<'_>) -> Result<BigPoly> {
    let coeff_count = reader.read_i32()?;
    let coeff_bit_count = reader.read_i32()?;
    let limbs_per_coeff = div_ceil(coeff_bit_count, BITS_PER_U64);
    let mut out = BigPoly::new(coeff_count, coeff_bit_count);
    let limbs = reader.read_limbs(coeff_count * limbs_per_coeff)?;
    out.as_mut_slice().copy_from_slice(&limbs);
    Ok(out)
}

impl Serialize for PolyArray {
    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_i32(&mut out, self.size());
        for poly in self.iter() {
            out.extend_from_slice(&poly.to_bytes());
        }
        out
    }
}

impl Deserialize for PolyArray {
    type Error = Error;

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let out = read_poly_array(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(Error::Serialization("trailing bytes".to_string()));
        }
        Ok(out)
    }
}

/// Read one `PolyArray` from a reader (for embedding in larger layouts).
pub fn read_poly_array(reader: &mut ByteReader<'_>) -> Result<PolyArray> {
    let size = reader.read_i32()?;
    let mut polys = Vec::with_capacity(size);
    for _ in 0..size {
        polys.push(read_big_poly(reader)?);
    }
    PolyArray::from_polys(polys)
}
