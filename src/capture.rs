//! Reader for the `HCaptureV0` capture file format.
//!
//! A capture starts with the magic string and an 8-byte little-endian
//! recording timestamp, followed by events framed as
//! `[evlen: u32 LE][evtime: i64 LE][evtype: u8][payload]` where `evlen`
//! covers the whole event including its prefix.

use std::io::{self, Read};
use std::net::Ipv4Addr;

use crate::error::DecodeError;

pub const MAGIC: &[u8] = b"HCaptureV0\0";

const PREFIX_LEN: usize = 13;

/// Sanity cap on a single event; we don't want unbounded buffer sizes.
pub const MAX_EVENT_LEN: usize = 16 * 1024;

const EV_NEW_CONNECTION: u8 = 0;
const EV_CLOSE: u8 = 1;
const EV_DATA: u8 = 2;

/// One recorded capture event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    NewConnection {
        stream_id: u32,
        source: (Ipv4Addr, u16),
        dest: (Ipv4Addr, u16),
    },
    Close {
        stream_id: u32,
    },
    Data {
        stream_id: u32,
        /// Direction within the stream: `0` or `1`.
        who: u8,
        data: Vec<u8>,
    },
}

/// Streaming reader over a capture file.
pub struct CaptureReader<R> {
    input: R,
    timestamp: i64,
}

impl<R: Read> CaptureReader<R> {
    /// Opens a capture: checks the magic and reads the recording
    /// timestamp.
    pub fn new(mut input: R) -> io::Result<CaptureReader<R>> {
        let mut magic = [0u8; MAGIC.len()];
        input.read_exact(&mut magic)?;
        if magic != *MAGIC {
            return Err(DecodeError::malformed("bad capture magic").into());
        }
        let mut stamp = [0u8; 8];
        input.read_exact(&mut stamp)?;
        Ok(CaptureReader {
            input,
            timestamp: i64::from_le_bytes(stamp),
        })
    }

    /// Seconds since the epoch at which the recording started.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Reads the next `(event time, event)` pair, or `None` at a clean
    /// end of file. EOF inside an event is an error.
    pub fn next_event(&mut self) -> io::Result<Option<(i64, Event)>> {
        let mut prefix = [0u8; PREFIX_LEN];
        match read_prefix(&mut self.input, &mut prefix)? {
            Prefix::Eof => return Ok(None),
            Prefix::Full => {}
        }

        let evlen = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        let evtime = i64::from_le_bytes([
            prefix[4], prefix[5], prefix[6], prefix[7], prefix[8], prefix[9], prefix[10],
            prefix[11],
        ]);
        let evtype = prefix[12];

        if evlen < PREFIX_LEN || evlen > MAX_EVENT_LEN {
            return Err(DecodeError::malformed("event length out of bounds").into());
        }

        let mut payload = vec![0u8; evlen - PREFIX_LEN];
        self.input.read_exact(&mut payload)?;

        let event = match evtype {
            EV_NEW_CONNECTION => decode_new_connection(&payload)?,
            EV_CLOSE => Event::Close {
                stream_id: read_u32(&payload, 0)?,
            },
            EV_DATA => {
                if payload.len() < 5 {
                    return Err(DecodeError::malformed("short data event").into());
                }
                Event::Data {
                    stream_id: read_u32(&payload, 0)?,
                    who: payload[4],
                    data: payload[5..].to_vec(),
                }
            }
            _ => return Err(DecodeError::malformed("unknown capture event type").into()),
        };
        Ok(Some((evtime, event)))
    }
}

impl<R: Read> Iterator for CaptureReader<R> {
    type Item = io::Result<(i64, Event)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_event() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

enum Prefix {
    Full,
    Eof,
}

/// Like `read_exact`, but a clean EOF before the first byte is `Eof`
/// rather than an error.
fn read_prefix(input: &mut impl Read, buf: &mut [u8]) -> io::Result<Prefix> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = input.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(Prefix::Eof);
            }
            return Err(DecodeError::malformed("unexpected end of capture").into());
        }
        filled += n;
    }
    Ok(Prefix::Full)
}

fn read_u32(buf: &[u8], offset: usize) -> io::Result<u32> {
    if buf.len() < offset + 4 {
        return Err(DecodeError::malformed("short capture event").into());
    }
    Ok(u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ]))
}

fn read_u16(buf: &[u8], offset: usize) -> io::Result<u16> {
    if buf.len() < offset + 2 {
        return Err(DecodeError::malformed("short capture event").into());
    }
    Ok(u16::from_le_bytes([buf[offset], buf[offset + 1]]))
}

fn decode_new_connection(payload: &[u8]) -> io::Result<Event> {
    if payload.len() != 16 {
        return Err(DecodeError::malformed("bad connection event size").into());
    }
    Ok(Event::NewConnection {
        stream_id: read_u32(payload, 0)?,
        source: (Ipv4Addr::from(read_u32(payload, 4)?), read_u16(payload, 8)?),
        dest: (Ipv4Addr::from(read_u32(payload, 10)?), read_u16(payload, 14)?),
    })
}
