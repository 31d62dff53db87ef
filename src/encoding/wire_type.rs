use crate::error::DecodeError;

/// Represents the wire type of a field key.
///
/// The integer value is equivalent with the encoded value. Group wire
/// types (3 and 4) are not part of the protocol and are rejected at
/// key-decode time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    SixtyFourBit = 1,
    LengthDelimited = 2,
    ThirtyTwoBit = 5,
}

impl TryFrom<u64> for WireType {
    type Error = DecodeError;

    #[inline]
    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::SixtyFourBit),
            2 => Ok(WireType::LengthDelimited),
            5 => Ok(WireType::ThirtyTwoBit),
            _ => Err(DecodeError::malformed("unsupported wire type")),
        }
    }
}

/// Checks that the expected wire type matches the actual wire type, or
/// returns an error result.
#[inline]
pub fn check_wire_type(expected: WireType, actual: WireType) -> Result<(), DecodeError> {
    if expected != actual {
        return Err(DecodeError::malformed("unexpected wire type for field"));
    }
    Ok(())
}
