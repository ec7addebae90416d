//! UDP (User Datagram Protocol) implementation
//!
//! This module provides the UDP header codec, the pseudo-header checksum,
//! the per-port handler table and the outbound framing path.

use byteorder::{BigEndian, ByteOrder};
use log::{debug, trace, warn};

use crate::buffer::PacketBuf;
use crate::error::{Result, StackError};
use crate::iface::dispatch::DispatchTable;
use crate::iface::ip::{IpOutput, NetContext};
use crate::iface::IpHandler;
use crate::network::icmp::UnreachableCode;
use crate::network::ipv4::{protocol, Ipv4Meta};
use crate::network::Checksum;

/// UDP header length in bytes
pub const UDP_HEADER_LEN: usize = 8;

/// UDP packet header structure
///
/// Represents the standard 8-byte UDP header as defined in RFC 768
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub length: u16, // Length of UDP header and data
    pub checksum: u16,
}

impl UdpHeader {
    /// Parse UDP header from byte slice
    ///
    /// Returns None if the data is too short to contain a valid UDP header
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < UDP_HEADER_LEN {
            return None;
        }

        Some(UdpHeader {
            src_port: BigEndian::read_u16(&data[0..2]),
            dst_port: BigEndian::read_u16(&data[2..4]),
            length: BigEndian::read_u16(&data[4..6]),
            checksum: BigEndian::read_u16(&data[6..8]),
        })
    }

    /// Convert UDP header to bytes
    pub fn to_bytes(&self) -> [u8; UDP_HEADER_LEN] {
        let mut bytes = [0u8; UDP_HEADER_LEN];
        BigEndian::write_u16(&mut bytes[0..2], self.src_port);
        BigEndian::write_u16(&mut bytes[2..4], self.dst_port);
        BigEndian::write_u16(&mut bytes[4..6], self.length);
        BigEndian::write_u16(&mut bytes[6..8], self.checksum);
        bytes
    }
}

/// Calculate UDP checksum with pseudo header
///
/// The 12-byte pseudo header (source, destination, zero, protocol, length)
/// is summed ahead of `segment`, and the segment's own checksum field is
/// read as zero. A result of zero is sent as `0xFFFF` (RFC 768).
pub fn udp_checksum(segment: &[u8], src_addr: [u8; 4], dst_addr: [u8; 4]) -> u16 {
    let mut sum = Checksum::new();
    sum.add_bytes(&src_addr)
        .add_bytes(&dst_addr)
        .add_bytes(&[0, protocol::UDP])
        .add_u16(segment.len() as u16)
        .add_bytes(&segment[..6])
        .add_bytes(&segment[UDP_HEADER_LEN..]);
    match sum.finish() {
        0 => 0xFFFF,
        value => value,
    }
}

/// Addressing details delivered with each datagram payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpMeta {
    pub src_addr: [u8; 4],
    pub src_port: u16,
    pub dst_port: u16,
}

/// Application callback bound to a UDP port
pub trait UdpHandler {
    fn on_datagram(&mut self, ctx: &mut NetContext, payload: PacketBuf, meta: &UdpMeta);
}

impl<F> UdpHandler for F
where
    F: FnMut(&mut NetContext, PacketBuf, &UdpMeta),
{
    fn on_datagram(&mut self, ctx: &mut NetContext, payload: PacketBuf, meta: &UdpMeta) {
        self(ctx, payload, meta)
    }
}

/// UDP layer: validates segments and demultiplexes them by port
pub struct UdpModule {
    ports: DispatchTable<u16, Box<dyn UdpHandler>>,
}

impl UdpModule {
    pub fn new(port_capacity: usize) -> Self {
        UdpModule {
            ports: DispatchTable::with_capacity(port_capacity),
        }
    }

    /// Bind `handler` to `port`, replacing any previous handler
    pub fn open(&mut self, port: u16, handler: Box<dyn UdpHandler>) -> Result<()> {
        if self.ports.register(port, handler)?.is_some() {
            debug!("udp port {} rebound", port);
        }
        Ok(())
    }

    /// Unbind `port`; closing a port that is not open does nothing
    pub fn close(&mut self, port: u16) {
        self.ports.unregister(port);
    }

    pub fn is_open(&self, port: u16) -> bool {
        self.ports.contains(port)
    }
}

impl IpHandler for UdpModule {
    fn ip_in(&mut self, ctx: &mut NetContext, mut buf: PacketBuf, meta: &Ipv4Meta) {
        let header = match UdpHeader::from_bytes(buf.as_slice()) {
            Some(header) => header,
            None => {
                debug!("udp segment too short ({} bytes)", buf.len());
                return;
            }
        };

        let udp_len = header.length as usize;
        if udp_len < UDP_HEADER_LEN || udp_len > buf.len() {
            debug!("udp length {} invalid for {}-byte segment", udp_len, buf.len());
            return;
        }
        buf.truncate(udp_len);

        let calculated = udp_checksum(buf.as_slice(), meta.src_addr, meta.dst_addr);
        if calculated != header.checksum {
            debug!(
                "udp checksum mismatch from {:?}: got {:#06x}, expected {:#06x}",
                meta.src_addr, header.checksum, calculated
            );
            return;
        }

        let udp_meta = UdpMeta {
            src_addr: meta.src_addr,
            src_port: header.src_port,
            dst_port: header.dst_port,
        };
        let delivered = self.ports.dispatch(header.dst_port, buf, |handler, mut payload| {
            if payload.pull_header(UDP_HEADER_LEN).is_ok() {
                trace!("udp {} bytes to port {}", payload.len(), udp_meta.dst_port);
                handler.on_datagram(ctx, payload, &udp_meta);
            }
        });

        if let Err(mut original) = delivered {
            debug!("no udp handler for port {}", header.dst_port);
            if let Err(e) = original.push_header(meta.header_len) {
                warn!("cannot restore IP header for port unreachable: {}", e);
                return;
            }
            ctx.signal_unreachable(&original, meta.src_addr, UnreachableCode::PortUnreachable);
        }
    }
}

/// Frame `buf` as a UDP segment from this interface and send it
pub fn udp_out(
    ip: &mut IpOutput,
    mut buf: PacketBuf,
    src_port: u16,
    dst_addr: [u8; 4],
    dst_port: u16,
) -> Result<()> {
    let length = buf.len() + UDP_HEADER_LEN;
    if length > u16::MAX as usize {
        return Err(StackError::DatagramTooLarge {
            len: length,
            max: u16::MAX as usize,
        });
    }

    let header = UdpHeader {
        src_port,
        dst_port,
        length: length as u16,
        checksum: 0,
    };
    buf.push_header(UDP_HEADER_LEN)?
        .copy_from_slice(&header.to_bytes());

    let sum = udp_checksum(buf.as_slice(), ip.local_addr(), dst_addr);
    BigEndian::write_u16(&mut buf.as_mut_slice()[6..8], sum);

    ip.ip_out(buf, dst_addr, protocol::UDP)?;
    Ok(())
}
