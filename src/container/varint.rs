// Variable-length integers used for container lengths and counts.
//
// Base-128, big-endian: most-significant group first.
// Each byte has bit 7 set except the final byte.

use std::io::{self, Read};

/// Maximum encoded length for a 64-bit value (ceil(64/7) = 10).
pub const MAX_VARINT_LEN: usize = 10;

/// Overflow guard: if these bits are set before a shift, the next `<< 7`
/// would drop significant bits.
const U64_OVERFLOW_MASK: u64 = 0xFE00_0000_0000_0000;

/// Errors from slice-based varint decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VarIntError {
    /// The value does not fit the target integer type.
    #[error("varint overflow")]
    Overflow,
    /// The input ended before the terminating byte.
    #[error("varint truncated")]
    Underflow,
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode a `u64` into `buf`, filling from the end.
/// Returns the number of bytes used (1..=10); the encoding occupies
/// `buf[MAX_VARINT_LEN - len..]`.
#[inline]
pub fn encode_u64(mut num: u64, buf: &mut [u8; MAX_VARINT_LEN]) -> usize {
    let mut i = MAX_VARINT_LEN;
    loop {
        i -= 1;
        buf[i] = (num as u8 & 0x7F) | 0x80;
        num >>= 7;
        if num == 0 {
            break;
        }
    }
    buf[MAX_VARINT_LEN - 1] &= 0x7F;
    MAX_VARINT_LEN - i
}

/// Append an encoded `usize` to an in-memory buffer.
pub fn push_usize(out: &mut Vec<u8>, num: usize) {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = encode_u64(num as u64, &mut buf);
    out.extend_from_slice(&buf[MAX_VARINT_LEN - len..]);
}

// ---------------------------------------------------------------------------
// Decoding from byte slices
// ---------------------------------------------------------------------------

/// Decode a `u64` from the start of `data`.
/// Returns `(value, bytes_consumed)`.
pub fn read_u64(data: &[u8]) -> Result<(u64, usize), VarIntError> {
    let mut val: u64 = 0;
    for (i, &byte) in data.iter().enumerate() {
        if val & U64_OVERFLOW_MASK != 0 {
            return Err(VarIntError::Overflow);
        }
        val = (val << 7) | u64::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Ok((val, i + 1));
        }
    }
    Err(VarIntError::Underflow)
}

/// Decode a `usize` from the start of `data`.
pub fn read_usize(data: &[u8]) -> Result<(usize, usize), VarIntError> {
    let (val, len) = read_u64(data)?;
    let val = usize::try_from(val).map_err(|_| VarIntError::Overflow)?;
    Ok((val, len))
}

// ---------------------------------------------------------------------------
// Decoding from `Read` (streaming)
// ---------------------------------------------------------------------------

/// Read a `u64` varint from a streaming source.
///
/// End of input surfaces as `UnexpectedEof`; overflow as `InvalidData`.
pub fn stream_read_u64<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut val: u64 = 0;
    let mut buf = [0u8; 1];
    loop {
        r.read_exact(&mut buf)?;
        let byte = buf[0];
        if val & U64_OVERFLOW_MASK != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "varint overflow",
            ));
        }
        val = (val << 7) | u64::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Ok(val);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(num: u64) -> Vec<u8> {
        let mut buf = [0u8; MAX_VARINT_LEN];
        let len = encode_u64(num, &mut buf);
        buf[MAX_VARINT_LEN - len..].to_vec()
    }

    #[test]
    fn single_byte_values() {
        assert_eq!(encoded(0), [0x00]);
        assert_eq!(encoded(1), [0x01]);
        assert_eq!(encoded(127), [0x7F]);
    }

    #[test]
    fn multi_byte_is_big_endian() {
        // 128 = 0b1_0000000 -> [0x81, 0x00]
        assert_eq!(encoded(128), [0x81, 0x00]);
        // 16384 = 1 << 14 -> [0x81, 0x80, 0x00]
        assert_eq!(encoded(16384), [0x81, 0x80, 0x00]);
    }

    #[test]
    fn max_value_uses_ten_bytes() {
        let bytes = encoded(u64::MAX);
        assert_eq!(bytes.len(), MAX_VARINT_LEN);
        assert_eq!(read_u64(&bytes).unwrap(), (u64::MAX, MAX_VARINT_LEN));
    }

    #[test]
    fn slice_decode_reports_consumed_length() {
        let mut data = encoded(300);
        data.extend_from_slice(&[0xAA, 0xBB]);
        assert_eq!(read_u64(&data).unwrap(), (300, 2));
        assert_eq!(read_usize(&data).unwrap(), (300, 2));
    }

    #[test]
    fn truncated_slice_underflows() {
        assert_eq!(read_u64(&[0x81]), Err(VarIntError::Underflow));
        assert_eq!(read_u64(&[]), Err(VarIntError::Underflow));
    }

    #[test]
    fn eleven_continuation_bytes_overflow() {
        let data = [0xFFu8; 11];
        assert_eq!(read_u64(&data), Err(VarIntError::Overflow));
    }

    #[test]
    fn stream_decode_matches_slice_decode() {
        for num in [0u64, 1, 127, 128, 255, 1 << 20, 1_000_000, u64::MAX] {
            let bytes = encoded(num);
            let mut cursor = io::Cursor::new(&bytes);
            assert_eq!(stream_read_u64(&mut cursor).unwrap(), num);
        }
    }

    #[test]
    fn stream_decode_eof_is_unexpected_eof() {
        let mut cursor = io::Cursor::new(vec![0x81u8]);
        let err = stream_read_u64(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn push_usize_appends() {
        let mut out = vec![0xEE];
        push_usize(&mut out, 200);
        assert_eq!(out, [0xEE, 0x81, 0x48]);
    }
}
