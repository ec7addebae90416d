//! Network layer protocols implementation
//!
//! This module contains implementations for network layer protocols:
//! - IPv4: header codec, inbound validation, outbound fragmentation
//! - ICMP: echo replies and destination-unreachable messages
//!
//! It also hosts the Internet checksum shared by IP, ICMP and UDP.

pub mod icmp;
pub mod ipv4;

// Re-export commonly used items
pub use icmp::{IcmpHeader, IcmpUnreachable, UnreachableCode};
pub use ipv4::{flags, protocol, Ipv4Header, Ipv4Meta};

/// Running one's-complement sum over one or more byte regions
///
/// Regions are summed as if concatenated, so every region except the last
/// must have an even length. This lets the UDP pseudo-header be summed
/// without being written in front of the segment.
#[derive(Debug, Default, Clone, Copy)]
pub struct Checksum {
    sum: u32,
}

impl Checksum {
    pub fn new() -> Self {
        Checksum { sum: 0 }
    }

    /// Add a region in 16-bit big-endian words, padding an odd tail with zero
    pub fn add_bytes(&mut self, data: &[u8]) -> &mut Self {
        let mut chunks = data.chunks_exact(2);
        for chunk in &mut chunks {
            self.sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
            self.fold();
        }
        if let [last] = chunks.remainder() {
            self.sum += (*last as u32) << 8;
            self.fold();
        }
        self
    }

    pub fn add_u16(&mut self, value: u16) -> &mut Self {
        self.add_bytes(&value.to_be_bytes())
    }

    fn fold(&mut self) {
        while (self.sum >> 16) > 0 {
            self.sum = (self.sum & 0xFFFF) + (self.sum >> 16);
        }
    }

    /// One's complement of the folded sum
    pub fn finish(&self) -> u16 {
        !(self.sum as u16)
    }
}

/// Calculate Internet checksum
///
/// Algorithm: Sum data in 16-bit chunks, add carry bits to the sum,
/// and return the one's complement of the result.
/// This is used for both IP and ICMP checksums.
pub fn checksum(data: &[u8]) -> u16 {
    Checksum::new().add_bytes(data).finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc1071_example() {
        let data = [0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];
        assert_eq!(checksum(&data), !0xddf2);
    }

    #[test]
    fn test_odd_length_is_zero_padded() {
        assert_eq!(checksum(&[0xAB]), checksum(&[0xAB, 0x00]));
    }

    #[test]
    fn test_split_regions_match_contiguous() {
        let data: Vec<u8> = (0..=200u8).collect();
        let whole = checksum(&data);
        let split = Checksum::new()
            .add_bytes(&data[..12])
            .add_bytes(&data[12..])
            .finish();
        assert_eq!(whole, split);
    }

    #[test]
    fn test_stored_checksum_verifies_and_detects_flip() {
        let mut data: Vec<u8> = (0..64u8).map(|b| b.wrapping_mul(37)).collect();
        data[10] = 0;
        data[11] = 0;
        let sum = checksum(&data);
        data[10..12].copy_from_slice(&sum.to_be_bytes());
        assert_eq!(checksum(&data), 0);

        for i in (0..data.len()).filter(|i| *i != 10 && *i != 11) {
            let mut corrupted = data.clone();
            corrupted[i] ^= 0x01;
            assert_ne!(checksum(&corrupted), 0, "flip at byte {} went unnoticed", i);
        }
    }
}
