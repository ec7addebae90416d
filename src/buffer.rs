//! Packet buffer with a sliding window over fixed storage
//!
//! Layout:
//!
//! ```text
//! |<-- headroom -->|<-- window (start..start+len) -->|<-- unused -->|
//! 0              start                                          capacity
//! ```
//!
//! Headers are prepended by moving `start` back into the headroom and removed
//! by moving it forward. Neither operation reallocates. A `PacketBuf` is
//! move-only so every layer holds it exclusively.

use std::fmt;

use crate::config::BUF_MAX_LEN;
use crate::error::{Result, StackError};

pub struct PacketBuf {
    storage: Vec<u8>,
    start: usize,
    len: usize,
}

impl PacketBuf {
    /// Allocate a zeroed buffer whose window covers the whole capacity
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity > BUF_MAX_LEN {
            return Err(StackError::CapacityExceeded {
                requested: capacity,
                max: BUF_MAX_LEN,
            });
        }
        Ok(PacketBuf {
            storage: vec![0u8; capacity],
            start: 0,
            len: capacity,
        })
    }

    /// Wrap a received frame. There is no headroom until a header is pulled.
    pub fn from_frame(frame: &[u8]) -> Result<Self> {
        let mut buf = Self::new(frame.len())?;
        buf.storage.copy_from_slice(frame);
        Ok(buf)
    }

    /// Place `payload` after `headroom` reserved bytes, ready for headers
    pub fn with_headroom(headroom: usize, payload: &[u8]) -> Result<Self> {
        let mut buf = Self::new(headroom + payload.len())?;
        buf.storage[headroom..].copy_from_slice(payload);
        buf.start = headroom;
        buf.len = payload.len();
        Ok(buf)
    }

    /// Extend the window backwards by `size` bytes and return the new header region
    pub fn push_header(&mut self, size: usize) -> Result<&mut [u8]> {
        if self.start < size {
            return Err(StackError::HeadroomExhausted {
                needed: size,
                available: self.start,
            });
        }
        self.start -= size;
        self.len += size;
        Ok(&mut self.storage[self.start..self.start + size])
    }

    /// Drop `size` bytes from the front of the window
    pub fn pull_header(&mut self, size: usize) -> Result<()> {
        if size > self.len {
            return Err(StackError::BufferUnderflow {
                requested: size,
                len: self.len,
            });
        }
        self.start += size;
        self.len -= size;
        Ok(())
    }

    /// Drop `size` bytes of trailing padding
    pub fn remove_padding(&mut self, size: usize) -> Result<()> {
        if size > self.len {
            return Err(StackError::BufferUnderflow {
                requested: size,
                len: self.len,
            });
        }
        self.len -= size;
        Ok(())
    }

    /// Shrink the window to at most `len` bytes
    pub fn truncate(&mut self, len: usize) {
        if len < self.len {
            self.len = len;
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.storage[self.start..self.start + self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.storage[self.start..self.start + self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes available in front of the window
    pub fn headroom(&self) -> usize {
        self.start
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }
}

// Metadata only, frame contents can be large.
impl fmt::Debug for PacketBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketBuf")
            .field("start", &self.start)
            .field("len", &self.len)
            .field("capacity", &self.storage.len())
            .finish()
    }
}
