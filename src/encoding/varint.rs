use bytes::{Buf, BufMut};

use crate::error::DecodeError;

/// Encodes an integer value into LEB128 variable length format, and
/// writes it to the buffer. The buffer must have enough remaining space
/// (maximum 10 bytes).
///
/// Signed values are masked to 64 bits first; a negative value therefore
/// always occupies 10 bytes.
#[inline]
pub fn encode_varint(mut value: u64, buf: &mut impl BufMut) {
    // Varints are never more than 10 bytes.
    for _ in 0..10 {
        if value < 0x80 {
            buf.put_u8(value as u8);
            break;
        } else {
            buf.put_u8(((value & 0x7F) | 0x80) as u8);
            value >>= 7;
        }
    }
}

/// Returns the encoded length of the value in LEB128 variable length
/// format. The returned value will be between 1 and 10, inclusive.
#[inline]
pub fn encoded_len_varint(value: u64) -> usize {
    // Based on [VarintSize64][1].
    // [1]: https://github.com/google/protobuf/blob/3.3.x/src/google/protobuf/io/coded_stream.h#L1301-L1309
    ((((value | 1).leading_zeros() ^ 63) * 9 + 73) / 64) as usize
}

/// Decodes a LEB128-encoded variable length integer from the buffer.
///
/// Reads at most 10 bytes. More than 10 continuation bytes, a final byte
/// that overflows 64 bits, or a truncated buffer are all `Malformed`.
#[inline]
pub fn decode_varint(buf: &mut impl Buf) -> Result<u64, DecodeError> {
    let mut value = 0u64;
    for count in 0..std::cmp::min(10, buf.remaining()) {
        let byte = buf.get_u8();
        value |= u64::from(byte & 0x7F) << (count * 7);
        if byte <= 0x7F {
            // The tenth byte may only contribute a single bit.
            if count == 9 && byte >= 0x02 {
                return Err(DecodeError::malformed("varint overflows 64 bits"));
            }
            return Ok(value);
        }
    }
    Err(DecodeError::malformed("invalid varint"))
}

/// Decodes a varint and reinterprets bit 63 as a sign bit.
#[inline]
pub fn decode_varint_signed(buf: &mut impl Buf) -> Result<i64, DecodeError> {
    decode_varint(buf).map(|value| value as i64)
}
