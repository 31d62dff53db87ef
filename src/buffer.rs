//! Bounded byte buffer shared by the splitters, the broker and the pipe.

use crate::error::{DecodeError, DecodeErrorKind};

pub const DEFAULT_BUF_SIZE: usize = 64 * 1024;

/// A bounded byte container with a contiguous read window.
///
/// `append` fails with `BufferFull` once `free` is exhausted; the buffer
/// never grows. Compaction happens lazily when an append would run off
/// the end of the backing storage and is never observable through the
/// API: `free + used == capacity` holds at all times.
#[derive(Clone)]
pub struct RingBuf {
    buf: Vec<u8>,
    start: usize,
    end: usize,
}

impl RingBuf {
    pub fn new() -> RingBuf {
        RingBuf::with_capacity(DEFAULT_BUF_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> RingBuf {
        RingBuf {
            buf: vec![0; capacity],
            start: 0,
            end: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn used(&self) -> usize {
        self.end - self.start
    }

    pub fn free(&self) -> usize {
        self.capacity() - self.used()
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Appends `data`, compacting first if the tail gap is too small.
    pub fn append(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        let n = data.len();
        if n > self.free() {
            return Err(DecodeError::new(DecodeErrorKind::BufferFull));
        }
        if n > self.buf.len() - self.end {
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }
        self.buf[self.end..self.end + n].copy_from_slice(data);
        self.end += n;
        Ok(())
    }

    /// Borrows `n` bytes starting `offset` bytes into the unread window.
    ///
    /// # Panics
    ///
    /// Panics if the requested range exceeds `used`.
    pub fn peek(&self, n: usize, offset: usize) -> &[u8] {
        assert!(offset + n <= self.used(), "peek exceeds buffered data");
        &self.buf[self.start + offset..self.start + offset + n]
    }

    /// Borrows the `n` most recently appended bytes.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds `used`.
    pub fn last(&self, n: usize) -> &[u8] {
        assert!(n <= self.used(), "read exceeds buffered data");
        &self.buf[self.end - n..self.end]
    }

    /// Discards `n` bytes from the front of the unread window.
    pub fn consume(&mut self, n: usize) {
        assert!(n <= self.used(), "consume exceeds buffered data");
        self.start += n;
        if self.start == self.end {
            self.start = 0;
            self.end = 0;
        }
    }

    /// Drops the `n` most recently appended bytes. Used by the intercept
    /// pipe to steal bytes back out of the forward path.
    pub fn truncate_last(&mut self, n: usize) {
        assert!(n <= self.used(), "truncate exceeds buffered data");
        self.end -= n;
    }

    pub fn clear(&mut self) {
        self.start = 0;
        self.end = 0;
    }
}

impl std::fmt::Debug for RingBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuf")
            .field("free", &self.free())
            .field("used", &self.used())
            .finish()
    }
}

impl Default for RingBuf {
    fn default() -> RingBuf {
        RingBuf::new()
    }
}
