//! Stateful frame splitters for the two envelope formats.
//!
//! A splitter is a bounded buffer fed with arbitrary chunks that yields
//! zero or more whole frames per feed. Partial input is held and
//! resumed on the next feed; the sequence of frames is independent of
//! how the stream is chunked. Feeding past capacity is `BufferFull`.
//!
//! Both splitters separate inspection from consumption: `peek_segment`
//! exposes the next whole frame without committing, `pull_segment`
//! consumes it.

use crate::buffer::{RingBuf, DEFAULT_BUF_SIZE};
use crate::error::DecodeError;
use crate::rpc::RpcHeader;

/// Default capacity of an Aurora splitter. 16K ought to be enough for
/// anybody.
pub const AURORA_BUF_SIZE: usize = 16 * 1024;

const AURORA_PREFIX: usize = 8;

/// Splits the in-game stream: `[type: u32 LE][len: u32 LE][body]`.
pub struct AuroraSplitter {
    buf: RingBuf,
}

impl AuroraSplitter {
    pub fn new() -> AuroraSplitter {
        AuroraSplitter::with_capacity(AURORA_BUF_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> AuroraSplitter {
        AuroraSplitter {
            buf: RingBuf::with_capacity(capacity),
        }
    }

    /// Appends a chunk of stream bytes.
    pub fn feed(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        self.buf.append(data)
    }

    pub fn free(&self) -> usize {
        self.buf.free()
    }

    pub fn used(&self) -> usize {
        self.buf.used()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Returns the next whole frame without consuming it.
    pub fn peek_segment(&self) -> Option<(u32, &[u8])> {
        let used = self.buf.used();
        if used < AURORA_PREFIX {
            return None;
        }
        let prefix = self.buf.peek(AURORA_PREFIX, 0);
        let packet_type = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
        let body_len = u32::from_le_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]) as usize;
        if used < AURORA_PREFIX + body_len {
            return None;
        }
        Some((packet_type, self.buf.peek(body_len, AURORA_PREFIX)))
    }

    /// Consumes and returns the next whole frame.
    pub fn pull_segment(&mut self) -> Option<(u32, Vec<u8>)> {
        let (packet_type, body) = match self.peek_segment() {
            Some((packet_type, body)) => (packet_type, body.to_vec()),
            None => return None,
        };
        self.buf.consume(AURORA_PREFIX + body.len());
        Some((packet_type, body))
    }
}

impl Default for AuroraSplitter {
    fn default() -> AuroraSplitter {
        AuroraSplitter::new()
    }
}

/// Splits the RPC envelope: `[header_len: u16 BE][header][body]` where
/// the header is a wire-encoded `BnetPacketHeader` and the body length
/// comes from its `Size` field.
///
/// The decoded header is cached across feeds while its body is still
/// incomplete, so each header decodes exactly once.
pub struct RpcSplitter {
    buf: RingBuf,
    header: Option<RpcHeader>,
}

impl RpcSplitter {
    pub fn new() -> RpcSplitter {
        RpcSplitter::with_capacity(DEFAULT_BUF_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> RpcSplitter {
        RpcSplitter {
            buf: RingBuf::with_capacity(capacity),
            header: None,
        }
    }

    pub fn feed(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        self.buf.append(data)
    }

    pub fn used(&self) -> usize {
        self.buf.used()
    }

    /// Returns the next whole `(header, body)` frame without consuming
    /// it. The header stays cached until the frame is pulled.
    pub fn peek_segment(&mut self) -> Result<Option<(RpcHeader, &[u8])>, DecodeError> {
        let used = self.buf.used();
        if used < 2 {
            return Ok(None);
        }
        let prefix = self.buf.peek(2, 0);
        let header_len = usize::from(u16::from_be_bytes([prefix[0], prefix[1]]));

        let header = match self.header.clone() {
            Some(header) => header,
            None => {
                if used < 2 + header_len {
                    return Ok(None);
                }
                let header = RpcHeader::decode(self.buf.peek(header_len, 2))?;
                self.header = Some(header.clone());
                header
            }
        };

        let body_len = header.size as usize;
        if used < 2 + header_len + body_len {
            return Ok(None);
        }
        Ok(Some((header, self.buf.peek(body_len, 2 + header_len))))
    }

    /// Consumes and returns the next whole `(header, body)` frame.
    pub fn pull_segment(&mut self) -> Result<Option<(RpcHeader, Vec<u8>)>, DecodeError> {
        let (header, body) = match self.peek_segment()? {
            Some((header, body)) => (header, body.to_vec()),
            None => return Ok(None),
        };
        let prefix = self.buf.peek(2, 0);
        let header_len = usize::from(u16::from_be_bytes([prefix[0], prefix[1]]));
        self.buf.consume(2 + header_len + body.len());
        self.header = None;
        Ok(Some((header, body)))
    }
}

impl Default for RpcSplitter {
    fn default() -> RpcSplitter {
        RpcSplitter::new()
    }
}
