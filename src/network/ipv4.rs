//! IPv4 header codec
//!
//! This module reads and writes the fixed 20-byte IPv4 header at explicit
//! offsets with explicit byte order. Options are never generated; on input
//! they are covered by the checksum and skipped.
//!
//! Features:
//! - IPv4 header parsing and serialization
//! - Checksum calculation and validation over the declared header length
//! - Flags / fragment-offset field encoding

use crate::network::checksum;
use byteorder::{BigEndian, ByteOrder};

pub const IPV4_HEADER_LEN: usize = 20;
pub const IPV4_VERSION: u8 = 4;
const DEFAULT_IHL: u8 = 5; // 5 * 4 = 20 bytes (standard header length)
const MAX_HEADER_LEN: usize = 60;

/// Largest payload an IPv4 datagram can carry
pub const MAX_DATAGRAM_PAYLOAD: usize = u16::MAX as usize - IPV4_HEADER_LEN;

/// IPv4 packet header structure
///
/// Represents the standard 20-byte IPv4 header as defined in RFC 791
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Header {
    pub version: u8,
    pub ihl: u8, // Internet Header Length
    pub tos: u8, // Type of Service
    pub total_len: u16,
    pub id: u16,
    pub flags_frag_offset: u16, // Flags and Fragment Offset
    pub ttl: u8,                // Time to Live
    pub protocol: u8,           // Next Protocol
    pub checksum: u16,
    pub src_addr: [u8; 4], // Source IP Address
    pub dst_addr: [u8; 4], // Destination IP Address
}

impl Ipv4Header {
    /// Header for one outbound fragment
    ///
    /// `offset` is in 8-byte units. The checksum is left at zero; call
    /// [`Ipv4Header::update_checksum`] once every field is final.
    pub fn new_fragment(
        id: u16,
        offset: u16,
        more_fragments: bool,
        ttl: u8,
        protocol: u8,
        src_addr: [u8; 4],
        dst_addr: [u8; 4],
        payload_len: u16,
    ) -> Self {
        Ipv4Header {
            version: IPV4_VERSION,
            ihl: DEFAULT_IHL,
            tos: 0,
            total_len: IPV4_HEADER_LEN as u16 + payload_len,
            id,
            flags_frag_offset: flags::encode(offset, more_fragments),
            ttl,
            protocol,
            checksum: 0,
            src_addr,
            dst_addr,
        }
    }

    /// Parse IPv4 header from byte slice
    ///
    /// Returns None if the data is too short or if the version field is not 4
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < IPV4_HEADER_LEN {
            return None;
        }

        let version = (data[0] & 0xF0) >> 4;
        if version != IPV4_VERSION {
            return None;
        }

        let mut src_addr = [0u8; 4];
        let mut dst_addr = [0u8; 4];
        src_addr.copy_from_slice(&data[12..16]);
        dst_addr.copy_from_slice(&data[16..20]);

        Some(Ipv4Header {
            version,
            ihl: data[0] & 0x0F,
            tos: data[1],
            total_len: BigEndian::read_u16(&data[2..4]),
            id: BigEndian::read_u16(&data[4..6]),
            flags_frag_offset: BigEndian::read_u16(&data[6..8]),
            ttl: data[8],
            protocol: data[9],
            checksum: BigEndian::read_u16(&data[10..12]),
            src_addr,
            dst_addr,
        })
    }

    /// Write the header into the first 20 bytes of `out`
    pub fn write_to(&self, out: &mut [u8]) {
        out[0] = (self.version << 4) | self.ihl;
        out[1] = self.tos;
        BigEndian::write_u16(&mut out[2..4], self.total_len);
        BigEndian::write_u16(&mut out[4..6], self.id);
        BigEndian::write_u16(&mut out[6..8], self.flags_frag_offset);
        out[8] = self.ttl;
        out[9] = self.protocol;
        BigEndian::write_u16(&mut out[10..12], self.checksum);
        out[12..16].copy_from_slice(&self.src_addr);
        out[16..20].copy_from_slice(&self.dst_addr);
    }

    /// Convert IPv4 header to bytes
    pub fn to_bytes(&self) -> [u8; IPV4_HEADER_LEN] {
        let mut bytes = [0u8; IPV4_HEADER_LEN];
        self.write_to(&mut bytes);
        bytes
    }

    /// Recalculate the checksum field, treating it as zero
    pub fn update_checksum(&mut self) {
        self.checksum = 0;
        self.checksum = checksum(&self.to_bytes());
    }

    /// Get the header length in bytes
    pub fn header_len(&self) -> usize {
        (self.ihl as usize) * 4
    }

    pub fn fragment_offset(&self) -> u16 {
        self.flags_frag_offset & flags::FRAGMENT_OFFSET_MASK
    }

    pub fn more_fragments(&self) -> bool {
        self.flags_frag_offset & flags::MORE_FRAGMENTS != 0
    }

    /// True when this datagram is one piece of a larger one
    pub fn is_fragment(&self) -> bool {
        self.more_fragments() || self.fragment_offset() != 0
    }
}

/// Verify the checksum of the header at the front of `packet`
///
/// The sum covers `header_len` bytes with the checksum field read as zero.
/// The input is never modified, so a failed check leaves the frame intact.
pub fn verify_header_checksum(packet: &[u8], header_len: usize) -> bool {
    if header_len < IPV4_HEADER_LEN || header_len > MAX_HEADER_LEN || header_len > packet.len() {
        return false;
    }
    let mut scratch = [0u8; MAX_HEADER_LEN];
    let header = &mut scratch[..header_len];
    header.copy_from_slice(&packet[..header_len]);
    let received = BigEndian::read_u16(&header[10..12]);
    header[10] = 0;
    header[11] = 0;
    checksum(header) == received
}

/// Addressing context handed to upper-layer handlers with each payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Meta {
    pub src_addr: [u8; 4],
    pub dst_addr: [u8; 4],
    pub protocol: u8,
    /// Length of the IP header removed in front of the payload
    pub header_len: usize,
}

/// IPv4 protocol constants
pub mod protocol {
    pub const ICMP: u8 = 1;
    pub const TCP: u8 = 6;
    pub const UDP: u8 = 17;
}

/// IPv4 flags constants
pub mod flags {
    pub const DONT_FRAGMENT: u16 = 0x4000;
    pub const MORE_FRAGMENTS: u16 = 0x2000;
    pub const FRAGMENT_OFFSET_MASK: u16 = 0x1FFF;

    /// Pack an offset in 8-byte units and the MF bit into the 16-bit field
    pub fn encode(offset: u16, more_fragments: bool) -> u16 {
        let mf = if more_fragments { MORE_FRAGMENTS } else { 0 };
        (offset & FRAGMENT_OFFSET_MASK) | mf
    }
}
