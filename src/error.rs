//! Error types shared by every layer of the stack
//!
//! Only synchronous failures of the registration and send APIs are errors.
//! Malformed inbound traffic is dropped silently and never shows up here.

use std::io;
use thiserror::Error;

/// Errors reported to callers of the registration and send paths
#[derive(Error, Debug)]
pub enum StackError {
    #[error("not enough headroom to prepend {needed} bytes (have {available})")]
    HeadroomExhausted { needed: usize, available: usize },

    #[error("cannot remove {requested} bytes from a {len}-byte window")]
    BufferUnderflow { requested: usize, len: usize },

    #[error("buffer capacity {requested} exceeds the {max}-byte limit")]
    CapacityExceeded { requested: usize, max: usize },

    #[error("dispatch table is full ({capacity} entries)")]
    TableFull { capacity: usize },

    #[error("datagram payload of {len} bytes exceeds the IPv4 limit of {max}")]
    DatagramTooLarge { len: usize, max: usize },

    #[error("invalid interface configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("link I/O failed: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, StackError>;
