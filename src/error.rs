//! Wire encoding and decoding errors.

use std::error::Error;
use std::fmt;

/// A wire decoding error.
///
/// `DecodeError` indicates that an input byte stream does not contain a
/// valid frame or message. The attached [`DecodeErrorKind`] is the spec's
/// error taxonomy; the optional context names the message type and field
/// where decoding stopped, when that is known.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeError {
    kind: DecodeErrorKind,
    /// Message type / field context, innermost last.
    context: Vec<(&'static str, &'static str)>,
}

/// The root cause of a [`DecodeError`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeErrorKind {
    /// Bad varint, bad framing or an unknown wire type.
    Malformed(&'static str),
    /// A field number the message type does not declare.
    UnknownField(u32),
    /// A non-repeated field was decoded twice.
    Duplicated(u32),
    /// A string field held non-UTF-8 data.
    BadEncoding,
    /// Ring buffer or splitter capacity exceeded.
    BufferFull,
    /// A packed scalar block did not end at the declared boundary.
    Misaligned,
    /// An Aurora packet type id missing from the fixed table.
    UnknownPacketType(u32),
    /// Peer broke the RPC contract (unknown response token, bad bind).
    ProtocolViolation(&'static str),
    /// A method is declared without a request or response type.
    NotImplemented,
}

impl DecodeError {
    pub(crate) fn new(kind: DecodeErrorKind) -> DecodeError {
        DecodeError {
            kind,
            context: Vec::new(),
        }
    }

    pub(crate) fn malformed(reason: &'static str) -> DecodeError {
        DecodeError::new(DecodeErrorKind::Malformed(reason))
    }

    /// The root cause of this error.
    pub fn kind(&self) -> &DecodeErrorKind {
        &self.kind
    }

    /// Pushes a `(message type, field)` pair onto the error context.
    ///
    /// Called while unwinding out of a nested decode, so the outermost
    /// message ends up last.
    pub(crate) fn push_context(mut self, message: &'static str, field: &'static str) -> DecodeError {
        self.context.push((message, field));
        self
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to decode message: {}", self.kind)?;
        for (message, field) in self.context.iter().rev() {
            write!(f, ": {}.{}", message, field)?;
        }
        Ok(())
    }
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeErrorKind::Malformed(reason) => write!(f, "malformed input: {}", reason),
            DecodeErrorKind::UnknownField(number) => {
                write!(f, "unknown field number {}", number)
            }
            DecodeErrorKind::Duplicated(number) => {
                write!(f, "duplicated non-repeated field {}", number)
            }
            DecodeErrorKind::BadEncoding => write!(f, "string field is not valid UTF-8"),
            DecodeErrorKind::BufferFull => write!(f, "buffer capacity exceeded"),
            DecodeErrorKind::Misaligned => {
                write!(f, "packed field did not end at the declared boundary")
            }
            DecodeErrorKind::UnknownPacketType(id) => {
                write!(f, "unknown packet type {}", id)
            }
            DecodeErrorKind::ProtocolViolation(reason) => {
                write!(f, "protocol violation: {}", reason)
            }
            DecodeErrorKind::NotImplemented => write!(f, "method body type is not implemented"),
        }
    }
}

impl Error for DecodeError {}

impl From<DecodeError> for std::io::Error {
    fn from(error: DecodeError) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::InvalidData, error)
    }
}

/// A wire encoding error.
///
/// `EncodeError` always indicates that a value failed to encode because
/// the destination buffer had insufficient capacity. Encoding is
/// otherwise infallible.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EncodeError {
    required: usize,
    remaining: usize,
}

impl EncodeError {
    pub(crate) fn new(required: usize, remaining: usize) -> EncodeError {
        EncodeError {
            required,
            remaining,
        }
    }

    /// Returns the required buffer capacity.
    pub fn required_capacity(&self) -> usize {
        self.required
    }

    /// Returns the remaining capacity in the destination at encode time.
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to encode message; insufficient buffer capacity (required: {}, remaining: {})",
            self.required, self.remaining
        )
    }
}

impl Error for EncodeError {}

impl From<EncodeError> for std::io::Error {
    fn from(error: EncodeError) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, error)
    }
}
