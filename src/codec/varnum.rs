//! Variable-length number encodings.
//!
//! TLV type and length fields use the 1/3/5/9-byte form: values below `0xfd`
//! occupy one byte; larger values are marked with `0xfd` (2-byte), `0xfe`
//! (4-byte), or `0xff` (8-byte) followed by the big-endian value. Values must
//! use the shortest form that fits.
//!
//! Nonnegative integers (used inside TLV values such as freshness periods and
//! request identifiers) use a distinct encoding: exactly 1, 2, 4, or 8
//! big-endian bytes, the shortest that fits.

use super::Error;
use bytes::{Buf, BufMut};

/// Returns the encoded size of a variable-length number.
pub fn size(value: u64) -> usize {
    match value {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Writes a variable-length number to the buffer.
pub fn write(value: u64, buf: &mut impl BufMut) {
    match value {
        0..=0xfc => buf.put_u8(value as u8),
        0xfd..=0xffff => {
            buf.put_u8(0xfd);
            buf.put_u16(value as u16);
        }
        0x1_0000..=0xffff_ffff => {
            buf.put_u8(0xfe);
            buf.put_u32(value as u32);
        }
        _ => {
            buf.put_u8(0xff);
            buf.put_u64(value);
        }
    }
}

/// Reads a variable-length number from the buffer, rejecting non-shortest
/// encodings.
pub fn read(buf: &mut impl Buf) -> Result<u64, Error> {
    if buf.remaining() < 1 {
        return Err(Error::EndOfBuffer);
    }
    let first = buf.get_u8();
    let value = match first {
        0..=0xfc => return Ok(first as u64),
        0xfd => {
            if buf.remaining() < 2 {
                return Err(Error::EndOfBuffer);
            }
            buf.get_u16() as u64
        }
        0xfe => {
            if buf.remaining() < 4 {
                return Err(Error::EndOfBuffer);
            }
            buf.get_u32() as u64
        }
        0xff => {
            if buf.remaining() < 8 {
                return Err(Error::EndOfBuffer);
            }
            buf.get_u64()
        }
        _ => unreachable!(),
    };
    if size(value) != size_of_marker(first) {
        return Err(Error::Invalid("varnum", "not shortest form"));
    }
    Ok(value)
}

fn size_of_marker(marker: u8) -> usize {
    match marker {
        0xfd => 3,
        0xfe => 5,
        0xff => 9,
        _ => 1,
    }
}

/// Returns the encoded size of a nonnegative integer.
pub fn int_size(value: u64) -> usize {
    match value {
        0..=0xff => 1,
        0x100..=0xffff => 2,
        0x1_0000..=0xffff_ffff => 4,
        _ => 8,
    }
}

/// Writes a nonnegative integer in the shortest of 1, 2, 4, or 8 big-endian
/// bytes.
pub fn write_int(value: u64, buf: &mut impl BufMut) {
    match int_size(value) {
        1 => buf.put_u8(value as u8),
        2 => buf.put_u16(value as u16),
        4 => buf.put_u32(value as u32),
        _ => buf.put_u64(value),
    }
}

/// Reads a nonnegative integer occupying exactly `len` bytes.
pub fn read_int(buf: &mut impl Buf, len: usize) -> Result<u64, Error> {
    if buf.remaining() < len {
        return Err(Error::EndOfBuffer);
    }
    match len {
        1 => Ok(buf.get_u8() as u64),
        2 => Ok(buf.get_u16() as u64),
        4 => Ok(buf.get_u32() as u64),
        8 => Ok(buf.get_u64()),
        _ => Err(Error::Invalid("nonnegative integer", "bad length")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn roundtrip(value: u64, expected_size: usize) {
        let mut buf = BytesMut::new();
        write(value, &mut buf);
        assert_eq!(buf.len(), expected_size);
        assert_eq!(size(value), expected_size);
        let mut bytes = buf.freeze();
        assert_eq!(read(&mut bytes).unwrap(), value);
        assert_eq!(bytes.remaining(), 0);
    }

    #[test]
    fn test_varnum_boundaries() {
        roundtrip(0, 1);
        roundtrip(0xfc, 1);
        roundtrip(0xfd, 3);
        roundtrip(0xffff, 3);
        roundtrip(0x1_0000, 5);
        roundtrip(0xffff_ffff, 5);
        roundtrip(0x1_0000_0000, 9);
        roundtrip(u64::MAX, 9);
    }

    #[test]
    fn test_varnum_rejects_non_shortest() {
        // 1 encoded with the 2-byte marker.
        let mut bytes = bytes::Bytes::from_static(&[0xfd, 0x00, 0x01]);
        assert!(matches!(read(&mut bytes), Err(Error::Invalid(_, _))));
    }

    #[test]
    fn test_varnum_truncated() {
        let mut bytes = bytes::Bytes::from_static(&[0xfd, 0x01]);
        assert_eq!(read(&mut bytes), Err(Error::EndOfBuffer));
    }

    fn int_roundtrip(value: u64, expected_size: usize) {
        let mut buf = BytesMut::new();
        write_int(value, &mut buf);
        assert_eq!(buf.len(), expected_size);
        assert_eq!(int_size(value), expected_size);
        let mut bytes = buf.freeze();
        assert_eq!(read_int(&mut bytes, expected_size).unwrap(), value);
    }

    #[test]
    fn test_int_boundaries() {
        int_roundtrip(0, 1);
        int_roundtrip(0xff, 1);
        int_roundtrip(0x100, 2);
        int_roundtrip(0xffff, 2);
        int_roundtrip(0x1_0000, 4);
        int_roundtrip(0xffff_ffff, 4);
        int_roundtrip(0x1_0000_0000, 8);
        int_roundtrip(u64::MAX, 8);
    }

    #[test]
    fn test_int_bad_length() {
        let mut bytes = bytes::Bytes::from_static(&[0x01, 0x02, 0x03]);
        assert!(matches!(
            read_int(&mut bytes, 3),
            Err(Error::Invalid(_, _))
        ));
    }
}
