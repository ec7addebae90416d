//! ICMP (Internet Control Message Protocol) implementation
//!
//! This module provides ICMP header parsing, the echo responder registered
//! by default, and the destination-unreachable messages the IP and UDP
//! layers emit when a datagram has nowhere to go.

use byteorder::{BigEndian, ByteOrder};
use log::{debug, trace, warn};

use crate::buffer::PacketBuf;
use crate::config::DEFAULT_HEADROOM;
use crate::iface::ip::{IpOutput, NetContext};
use crate::iface::IpHandler;
use crate::network::checksum;
use crate::network::ipv4::{protocol, Ipv4Meta, IPV4_HEADER_LEN};

/// Minimum ICMP header length in bytes
pub const ICMP_HEADER_LEN: usize = 8;

/// ICMP message types
pub const ICMP_TYPE_ECHO_REPLY: u8 = 0;
pub const ICMP_TYPE_UNREACHABLE: u8 = 3;
pub const ICMP_TYPE_ECHO_REQUEST: u8 = 8;

/// Bytes of the offending datagram's payload quoted in an error message
const ICMP_QUOTED_PAYLOAD: usize = 8;

/// ICMP packet header structure
///
/// Represents the standard 8-byte ICMP header as defined in RFC 792
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcmpHeader {
    pub msg_type: u8,  // ICMP message type
    pub msg_code: u8,  // ICMP message code
    pub checksum: u16, // ICMP checksum
    pub rest: [u8; 4], // Type-specific data (e.g., identifier and sequence for echo)
}

impl IcmpHeader {
    /// Parse ICMP header from byte slice
    ///
    /// Returns None if the data is too short to contain a valid ICMP header
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < ICMP_HEADER_LEN {
            return None;
        }

        let mut rest = [0u8; 4];
        rest.copy_from_slice(&data[4..8]);
        Some(IcmpHeader {
            msg_type: data[0],
            msg_code: data[1],
            checksum: BigEndian::read_u16(&data[2..4]),
            rest,
        })
    }

    /// Convert ICMP header to bytes
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        bytes[0] = self.msg_type;
        bytes[1] = self.msg_code;
        BigEndian::write_u16(&mut bytes[2..4], self.checksum);
        bytes[4..8].copy_from_slice(&self.rest);
        bytes
    }

    /// Check if this is an Echo Request message
    pub fn is_echo_request(&self) -> bool {
        self.msg_type == ICMP_TYPE_ECHO_REQUEST
    }

    /// Get the identifier field for Echo Request/Reply messages
    pub fn identifier(&self) -> u16 {
        BigEndian::read_u16(&self.rest[0..2])
    }

    /// Get the sequence number field for Echo Request/Reply messages
    pub fn sequence(&self) -> u16 {
        BigEndian::read_u16(&self.rest[2..4])
    }
}

/// Build a complete ICMP message with its checksum filled in
fn build_message(msg_type: u8, msg_code: u8, rest: [u8; 4], body: &[u8]) -> Vec<u8> {
    let header = IcmpHeader {
        msg_type,
        msg_code,
        checksum: 0,
        rest,
    };
    let mut message = Vec::with_capacity(ICMP_HEADER_LEN + body.len());
    message.extend_from_slice(&header.to_bytes());
    message.extend_from_slice(body);
    let sum = checksum(&message);
    BigEndian::write_u16(&mut message[2..4], sum);
    message
}

/// Destination-unreachable codes the stack emits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnreachableCode {
    ProtocolUnreachable = 2,
    PortUnreachable = 3,
}

impl UnreachableCode {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Sink for "nothing here handles this" notifications
///
/// `original` starts at the IP header of the datagram that could not be
/// delivered. Implementations may send through `ip`.
pub trait Unreachable {
    fn signal(
        &mut self,
        ip: &mut IpOutput,
        original: &PacketBuf,
        dst_addr: [u8; 4],
        code: UnreachableCode,
    );
}

/// Answers with an ICMP destination-unreachable message (RFC 792)
#[derive(Debug, Default, Clone, Copy)]
pub struct IcmpUnreachable;

impl Unreachable for IcmpUnreachable {
    fn signal(
        &mut self,
        ip: &mut IpOutput,
        original: &PacketBuf,
        dst_addr: [u8; 4],
        code: UnreachableCode,
    ) {
        let data = original.as_slice();
        if data.len() < IPV4_HEADER_LEN {
            return;
        }
        let header_len = ((data[0] & 0x0F) as usize * 4).max(IPV4_HEADER_LEN);
        let quoted = data.len().min(header_len + ICMP_QUOTED_PAYLOAD);

        let message = build_message(ICMP_TYPE_UNREACHABLE, code.code(), [0; 4], &data[..quoted]);
        let result = PacketBuf::with_headroom(DEFAULT_HEADROOM, &message)
            .and_then(|buf| ip.ip_out(buf, dst_addr, protocol::ICMP));
        if let Err(e) = result {
            warn!("failed to send ICMP unreachable to {:?}: {}", dst_addr, e);
        }
    }
}

/// Built-in ICMP handler: replies to echo requests
#[derive(Debug, Default)]
pub struct IcmpModule;

impl IpHandler for IcmpModule {
    fn ip_in(&mut self, ctx: &mut NetContext, buf: PacketBuf, meta: &Ipv4Meta) {
        let message = buf.as_slice();
        let header = match IcmpHeader::from_bytes(message) {
            Some(header) => header,
            None => return,
        };
        if checksum(message) != 0 {
            debug!("icmp checksum mismatch from {:?}", meta.src_addr);
            return;
        }

        match header.msg_type {
            ICMP_TYPE_ECHO_REQUEST => {
                trace!(
                    "echo request id {} seq {} from {:?}",
                    header.identifier(),
                    header.sequence(),
                    meta.src_addr
                );
                let reply = build_message(
                    ICMP_TYPE_ECHO_REPLY,
                    0,
                    header.rest,
                    &message[ICMP_HEADER_LEN..],
                );
                let result = PacketBuf::with_headroom(DEFAULT_HEADROOM, &reply)
                    .and_then(|buf| ctx.ip_out(buf, meta.src_addr, protocol::ICMP));
                if let Err(e) = result {
                    warn!("failed to send echo reply to {:?}: {}", meta.src_addr, e);
                }
            }
            other => debug!("ignoring ICMP type {} from {:?}", other, meta.src_addr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InterfaceConfig;
    use crate::iface::ip::CaptureLink;
    use crate::network::ipv4::Ipv4Header;

    fn context() -> (NetContext, CaptureLink) {
        let link = CaptureLink::new();
        let ip = IpOutput::new(
            InterfaceConfig::with_ip([10, 0, 0, 1]),
            Box::new(link.clone()),
        )
        .unwrap();
        (NetContext::new(ip, Box::new(IcmpUnreachable)), link)
    }

    fn meta() -> Ipv4Meta {
        Ipv4Meta {
            src_addr: [10, 0, 0, 2],
            dst_addr: [10, 0, 0, 1],
            protocol: protocol::ICMP,
            header_len: 20,
        }
    }

    #[test]
    fn test_echo_request_gets_reply() {
        let (mut ctx, link) = context();
        let request = build_message(ICMP_TYPE_ECHO_REQUEST, 0, [0x12, 0x34, 0x00, 0x07], b"ping!");
        let buf = PacketBuf::from_frame(&request).unwrap();
        IcmpModule.ip_in(&mut ctx, buf, &meta());

        let frames = link.take();
        assert_eq!(frames.len(), 1);
        let (frame, dst) = &frames[0];
        assert_eq!(*dst, [10, 0, 0, 2]);
        let reply = &frame.as_slice()[20..];
        let header = IcmpHeader::from_bytes(reply).unwrap();
        assert_eq!(header.msg_type, ICMP_TYPE_ECHO_REPLY);
        assert_eq!(header.identifier(), 0x1234);
        assert_eq!(header.sequence(), 7);
        assert_eq!(&reply[8..], b"ping!");
        assert_eq!(checksum(reply), 0);
    }

    #[test]
    fn test_corrupted_echo_request_is_ignored() {
        let (mut ctx, link) = context();
        let mut request = build_message(ICMP_TYPE_ECHO_REQUEST, 0, [0; 4], b"ping");
        request[9] ^= 0xFF;
        IcmpModule.ip_in(&mut ctx, PacketBuf::from_frame(&request).unwrap(), &meta());
        assert!(link.is_empty());
    }

    #[test]
    fn test_unreachable_quotes_header_and_eight_bytes() {
        let (mut ctx, link) = context();
        let mut original = Ipv4Header::new_fragment(
            9,
            0,
            false,
            64,
            200,
            [10, 0, 0, 2],
            [10, 0, 0, 1],
            12,
        );
        original.update_checksum();
        let mut datagram = original.to_bytes().to_vec();
        datagram.extend_from_slice(b"0123456789ab");
        let buf = PacketBuf::from_frame(&datagram).unwrap();

        ctx.signal_unreachable(&buf, [10, 0, 0, 2], UnreachableCode::ProtocolUnreachable);

        let frames = link.take();
        assert_eq!(frames.len(), 1);
        let outer = Ipv4Header::from_bytes(frames[0].0.as_slice()).unwrap();
        assert_eq!(outer.protocol, protocol::ICMP);
        let message = &frames[0].0.as_slice()[20..];
        assert_eq!(message[0], ICMP_TYPE_UNREACHABLE);
        assert_eq!(message[1], 2);
        assert_eq!(&message[8..], &datagram[..28]);
        assert_eq!(checksum(message), 0);
    }
}
