//! Unsigned LEB128, the integer encoding used by operation serialization.

use unsigned_varint::{decode, encode};

use crate::CodecError;

/// Append `value` to `buffer`
pub fn write_u64(buffer: &mut Vec<u8>, value: u64) {
    buffer.extend_from_slice(encode::u64(value, &mut encode::u64_buffer()));
}

/// Append a length-prefixed byte slice
pub fn write_bytes(buffer: &mut Vec<u8>, bytes: &[u8]) {
    write_u64(buffer, bytes.len() as u64);
    buffer.extend_from_slice(bytes);
}

/// Read a value from the front of `input`, returning it with the remaining bytes
pub fn read_u64(input: &[u8]) -> Result<(u64, &[u8]), CodecError> {
    decode::u64(input).map_err(|error| match error {
        decode::Error::Insufficient => CodecError::TruncatedVarint,
        decode::Error::Overflow => CodecError::VarintOverflow,
        _ => CodecError::NonMinimalVarint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: u64) -> Vec<u8> {
        let mut buffer = Vec::new();
        write_u64(&mut buffer, value);
        buffer
    }

    #[test]
    fn test_known_encodings() {
        assert_eq!(encode(0), vec![0x00]);
        assert_eq!(encode(127), vec![0x7f]);
        assert_eq!(encode(128), vec![0x80, 0x01]);
        assert_eq!(encode(300), vec![0xac, 0x02]);
        assert_eq!(encode(u64::MAX).len(), 10);
    }

    #[test]
    fn test_length_prefixed_bytes() {
        let mut buffer = Vec::new();
        write_bytes(&mut buffer, &[0xaa; 130]);
        assert_eq!(&buffer[..2], &[0x82, 0x01]);
        assert_eq!(buffer.len(), 132);
    }

    #[test]
    fn test_read_returns_rest() {
        let (value, rest) = read_u64(&[0xac, 0x02, 0xff]).unwrap();
        assert_eq!(value, 300);
        assert_eq!(rest, &[0xff]);

        let encoded = encode(u64::MAX);
        let (value, rest) = read_u64(&encoded).unwrap();
        assert_eq!(value, u64::MAX);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_read_errors() {
        assert_eq!(read_u64(&[0x80, 0x80]), Err(CodecError::TruncatedVarint));
        assert_eq!(read_u64(&[]), Err(CodecError::TruncatedVarint));
        let too_long = [0xff; 11];
        assert_eq!(read_u64(&too_long), Err(CodecError::VarintOverflow));
        assert_eq!(read_u64(&[0x80, 0x00]), Err(CodecError::NonMinimalVarint));
    }
}
