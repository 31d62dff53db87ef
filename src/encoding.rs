//! Low-level field key and varint codec.
//!
//! These helpers speak the protobuf-compatible subset of the wire format
//! the Aurora protocols use: varints, fixed 32/64-bit values and
//! length-delimited payloads. Field keys are encoded as varints; every
//! field number the schemas declare fits a single key byte, so the bytes
//! on the wire match the original single-byte tags exactly.

use bytes::{Buf, BufMut};

use crate::error::DecodeError;

pub mod varint;
pub use varint::{decode_varint, decode_varint_signed, encode_varint, encoded_len_varint};

pub mod wire_type;
pub use wire_type::{check_wire_type, WireType};

pub const MIN_TAG: u32 = 1;
pub const MAX_TAG: u32 = (1 << 29) - 1;

/// Encodes a field key, which consists of a wire type designator and the
/// field number.
#[inline]
pub fn encode_key(field_number: u32, wire_type: WireType, buf: &mut impl BufMut) {
    debug_assert!((MIN_TAG..=MAX_TAG).contains(&field_number));
    let key = (field_number << 3) | wire_type as u32;
    encode_varint(u64::from(key), buf);
}

/// Decodes a field key into `(field_number, wire_type)`.
#[inline]
pub fn decode_key(buf: &mut impl Buf) -> Result<(u32, WireType), DecodeError> {
    let key = decode_varint(buf)?;
    if key > u64::from(u32::MAX) {
        return Err(DecodeError::malformed("field key out of range"));
    }
    let wire_type = WireType::try_from(key & 0x07)?;
    let field_number = key as u32 >> 3;
    if field_number < MIN_TAG {
        return Err(DecodeError::malformed("field number is zero"));
    }
    Ok((field_number, wire_type))
}

/// Returns the width of an encoded field key with the given number.
#[inline]
pub fn key_len(field_number: u32) -> usize {
    encoded_len_varint(u64::from(field_number << 3))
}

/// Decodes a packed block of varints spanning exactly `len` bytes of the
/// buffer.
///
/// An element whose continuation bytes run past the block boundary is
/// `Misaligned`: the block did not end where the length prefix said it
/// would.
pub fn decode_packed_varint(
    buf: &mut impl Buf,
    len: usize,
    out: &mut Vec<u64>,
) -> Result<(), DecodeError> {
    if len > buf.remaining() {
        return Err(DecodeError::malformed("packed block exceeds buffer"));
    }
    let limit = buf.remaining() - len;
    while buf.remaining() > limit {
        out.push(decode_varint(buf)?);
        if buf.remaining() < limit {
            return Err(DecodeError::new(crate::error::DecodeErrorKind::Misaligned));
        }
    }
    Ok(())
}

/// Writes a sequence of varints with no inter-element framing.
pub fn encode_packed_varint(values: impl IntoIterator<Item = u64>, buf: &mut impl BufMut) {
    for value in values {
        encode_varint(value, buf);
    }
}

/// Reads the length prefix of a length-delimited payload and checks it
/// against the remaining buffer.
pub fn decode_length_delimiter(buf: &mut impl Buf) -> Result<usize, DecodeError> {
    let len = decode_varint(buf)?;
    if len > buf.remaining() as u64 {
        return Err(DecodeError::malformed("length delimiter exceeds buffer"));
    }
    Ok(len as usize)
}

/// A single field payload with its wire type resolved but its meaning
/// uninterpreted. What schema-less consumers get.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawValue {
    Varint(u64),
    Fixed32(u32),
    Fixed64(u64),
    Bytes(Vec<u8>),
}

/// Reads one `(field_number, payload)` pair without a schema.
pub fn read_field(buf: &mut impl Buf) -> Result<(u32, RawValue), DecodeError> {
    let (field_number, wire_type) = decode_key(buf)?;
    let value = match wire_type {
        WireType::Varint => RawValue::Varint(decode_varint(buf)?),
        WireType::ThirtyTwoBit => {
            if buf.remaining() < 4 {
                return Err(DecodeError::malformed("truncated fixed32 value"));
            }
            RawValue::Fixed32(buf.get_u32_le())
        }
        WireType::SixtyFourBit => {
            if buf.remaining() < 8 {
                return Err(DecodeError::malformed("truncated fixed64 value"));
            }
            RawValue::Fixed64(buf.get_u64_le())
        }
        WireType::LengthDelimited => {
            let len = decode_length_delimiter(buf)?;
            let mut data = vec![0u8; len];
            buf.copy_to_slice(&mut data);
            RawValue::Bytes(data)
        }
    };
    Ok((field_number, value))
}

/// Writes one `(field_number, payload)` pair.
pub fn write_field(field_number: u32, value: &RawValue, buf: &mut impl BufMut) {
    match value {
        RawValue::Varint(v) => {
            encode_key(field_number, WireType::Varint, buf);
            encode_varint(*v, buf);
        }
        RawValue::Fixed32(v) => {
            encode_key(field_number, WireType::ThirtyTwoBit, buf);
            buf.put_u32_le(*v);
        }
        RawValue::Fixed64(v) => {
            encode_key(field_number, WireType::SixtyFourBit, buf);
            buf.put_u64_le(*v);
        }
        RawValue::Bytes(data) => {
            encode_key(field_number, WireType::LengthDelimited, buf);
            encode_varint(data.len() as u64, buf);
            buf.put_slice(data);
        }
    }
}

/// Reads `(field_number, payload)` pairs until the buffer is exhausted.
/// The tracing path for bodies whose message type nobody implements.
pub fn read_fields(buf: &mut impl Buf) -> Result<Vec<(u32, RawValue)>, DecodeError> {
    let mut fields = Vec::new();
    while buf.has_remaining() {
        fields.push(read_field(buf)?);
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_roundtrip() {
        let mut buf = Vec::new();
        for number in [1u32, 7, 15, 200, MAX_TAG] {
            for wire_type in [
                WireType::Varint,
                WireType::SixtyFourBit,
                WireType::LengthDelimited,
                WireType::ThirtyTwoBit,
            ] {
                buf.clear();
                encode_key(number, wire_type, &mut buf);
                let mut bytes = &buf[..];
                assert_eq!(decode_key(&mut bytes).unwrap(), (number, wire_type));
                assert_eq!(buf.len(), key_len(number));
            }
        }
    }

    #[test]
    fn small_keys_are_single_bytes() {
        // Field numbers below 16 must match the original one-byte tags.
        let mut buf = Vec::new();
        encode_key(5, WireType::LengthDelimited, &mut buf);
        assert_eq!(buf, [5 << 3 | 2]);
    }

    #[test]
    fn zero_field_number_rejected() {
        let mut bytes: &[u8] = &[0x00];
        decode_key(&mut bytes).expect_err("field number zero accepted");
    }

    #[test]
    fn packed_roundtrip() {
        let values = [0u64, 1, 127, 128, 300, u64::MAX];
        let mut buf = Vec::new();
        encode_packed_varint(values.iter().copied(), &mut buf);

        let mut out = Vec::new();
        let mut bytes = &buf[..];
        decode_packed_varint(&mut bytes, buf.len(), &mut out).unwrap();
        assert_eq!(out, values);
    }

    #[test]
    fn raw_field_roundtrip() {
        let fields = [
            (1, RawValue::Varint(42)),
            (2, RawValue::Fixed32(0xDEADBEEF)),
            (3, RawValue::Fixed64(7)),
            (4, RawValue::Bytes(vec![1, 2, 3])),
        ];
        let mut buf = Vec::new();
        for (number, value) in &fields {
            write_field(*number, value, &mut buf);
        }
        let mut bytes = &buf[..];
        assert_eq!(read_fields(&mut bytes).unwrap(), fields);
    }

    #[test]
    fn packed_misaligned() {
        // A two-byte varint whose block is cut after the first byte.
        let mut bytes: &[u8] = &[0xAC, 0x02];
        let mut out = Vec::new();
        decode_packed_varint(&mut bytes, 1, &mut out).expect_err("misaligned block accepted");
    }
}
