//! Serialize structured data as TLV.
//!
//! Every wire element in this crate is a TLV: a variable-length type number,
//! a variable-length length, and `length` bytes of value. Types implement
//! [Encode] and [Decode] over [bytes::Buf]/[bytes::BufMut]; `encode` asserts
//! the reported length matches the written bytes, and `decode` rejects
//! trailing data.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

pub mod varnum;

/// Errors that can occur when encoding or decoding TLV data.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("end of buffer")]
    EndOfBuffer,
    #[error("extra data: {0} bytes remaining")]
    ExtraData(usize),
    #[error("unexpected tlv type: expected {expected}, found {actual}")]
    UnexpectedType { expected: u64, actual: u64 },
    #[error("tlv length exceeds buffer")]
    LengthOverflow,
    #[error("invalid {0}: {1}")]
    Invalid(&'static str, &'static str),
}

/// Types that can be written to a buffer as TLV bytes.
pub trait Encode {
    /// Returns the encoded length of this value, including any TLV headers.
    fn encoded_len(&self) -> usize;

    /// Writes this value to the buffer.
    fn write(&self, buf: &mut impl BufMut);

    /// Encodes this value to bytes.
    fn encode(&self) -> Bytes {
        let len = self.encoded_len();
        let mut buf = BytesMut::with_capacity(len);
        self.write(&mut buf);
        assert_eq!(buf.len(), len);
        buf.freeze()
    }
}

/// Types that can be read from a buffer of TLV bytes.
pub trait Decode: Sized {
    /// Reads a value from the buffer, leaving any trailing bytes.
    fn read(buf: &mut impl Buf) -> Result<Self, Error>;

    /// Decodes a value from the buffer, rejecting trailing bytes.
    fn decode(mut buf: impl Buf) -> Result<Self, Error> {
        let value = Self::read(&mut buf)?;
        match buf.remaining() {
            0 => Ok(value),
            n => Err(Error::ExtraData(n)),
        }
    }
}

/// Returns the full encoded length of a TLV with the given type number and
/// value length.
pub fn tlv_len(typ: u64, value_len: usize) -> usize {
    varnum::size(typ) + varnum::size(value_len as u64) + value_len
}

/// Writes a TLV header (type and length).
pub fn write_header(typ: u64, value_len: usize, buf: &mut impl BufMut) {
    varnum::write(typ, buf);
    varnum::write(value_len as u64, buf);
}

/// Reads a TLV header, verifying the value fits in the buffer.
pub fn read_header(buf: &mut impl Buf) -> Result<(u64, usize), Error> {
    let typ = varnum::read(buf)?;
    let len = varnum::read(buf)? as usize;
    if buf.remaining() < len {
        return Err(Error::LengthOverflow);
    }
    Ok((typ, len))
}

/// Reads a TLV header of the expected type, returning the value length.
pub fn expect(typ: u64, buf: &mut impl Buf) -> Result<usize, Error> {
    let (actual, len) = read_header(buf)?;
    if actual != typ {
        return Err(Error::UnexpectedType {
            expected: typ,
            actual,
        });
    }
    Ok(len)
}

/// Returns whether a TLV type number is critical: an unrecognized critical
/// element aborts decoding, a non-critical one is skipped.
pub fn is_critical(typ: u64) -> bool {
    typ <= 31 || typ % 2 == 1
}
