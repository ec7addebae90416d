//! Outbound IP path and the per-stack context handed to protocol handlers
//!
//! [`IpOutput`] owns the interface configuration, the datagram
//! identification counter and the link collaborator. [`NetContext`] adds the
//! unreachable signaller. Both live inside [`NetStack`](super::NetStack) and
//! are lent to handlers while they run.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, trace, warn};

use crate::buffer::PacketBuf;
use crate::config::{InterfaceConfig, DEFAULT_HEADROOM};
use crate::error::{Result, StackError};
use crate::network::icmp::{Unreachable, UnreachableCode};
use crate::network::ipv4::{Ipv4Header, IPV4_HEADER_LEN, MAX_DATAGRAM_PAYLOAD};
use crate::transport::udp;

/// Address resolution and transmission below IP
///
/// Takes ownership of a complete IP datagram. Resolution failures are the
/// collaborator's business and are not reported back.
pub trait LinkOutput {
    fn resolve_and_transmit(&mut self, frame: PacketBuf, dst_addr: [u8; 4]);
}

/// Link that keeps every transmitted datagram for later inspection
///
/// Clones share the same queue, so one handle can be given to the stack
/// and another kept by the caller.
#[derive(Debug, Clone, Default)]
pub struct CaptureLink {
    frames: Rc<RefCell<Vec<(PacketBuf, [u8; 4])>>>,
}

impl CaptureLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything transmitted so far
    pub fn take(&self) -> Vec<(PacketBuf, [u8; 4])> {
        self.frames.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.frames.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.borrow().is_empty()
    }
}

impl LinkOutput for CaptureLink {
    fn resolve_and_transmit(&mut self, frame: PacketBuf, dst_addr: [u8; 4]) {
        self.frames.borrow_mut().push((frame, dst_addr));
    }
}

/// Serializes and fragments outbound datagrams
pub struct IpOutput {
    config: InterfaceConfig,
    packet_id: u32,
    link: Box<dyn LinkOutput>,
}

impl IpOutput {
    /// Fails when `config` does not describe a usable link
    pub fn new(config: InterfaceConfig, link: Box<dyn LinkOutput>) -> Result<Self> {
        config.validate()?;
        Ok(IpOutput {
            config,
            packet_id: 0,
            link,
        })
    }

    pub fn config(&self) -> &InterfaceConfig {
        &self.config
    }

    pub fn local_addr(&self) -> [u8; 4] {
        self.config.ip
    }

    /// Largest fragment payload: MTU minus the header, rounded down to 8 bytes
    pub fn max_fragment_payload(&self) -> usize {
        (self.config.mtu - IPV4_HEADER_LEN) & !7
    }

    /// Identification value the next `ip_out` call will use
    pub fn peek_packet_id(&self) -> u16 {
        self.packet_id as u16
    }

    fn next_packet_id(&mut self) -> u16 {
        let id = self.packet_id as u16;
        self.packet_id = self.packet_id.wrapping_add(1);
        id
    }

    /// Send `buf` as one IP datagram, fragmenting it when it exceeds the MTU
    ///
    /// All fragments share one identification value, which is returned.
    /// Without fragmentation the datagram header is prepended in place, so
    /// `buf` needs at least 20 bytes of headroom.
    pub fn ip_out(&mut self, buf: PacketBuf, dst_addr: [u8; 4], protocol: u8) -> Result<u16> {
        let total_len = buf.len();
        if total_len > MAX_DATAGRAM_PAYLOAD {
            return Err(StackError::DatagramTooLarge {
                len: total_len,
                max: MAX_DATAGRAM_PAYLOAD,
            });
        }

        let max_payload = self.max_fragment_payload();

        if total_len <= max_payload {
            if buf.headroom() < IPV4_HEADER_LEN {
                return Err(StackError::HeadroomExhausted {
                    needed: IPV4_HEADER_LEN,
                    available: buf.headroom(),
                });
            }
            let id = self.next_packet_id();
            self.fragment_out(buf, dst_addr, protocol, id, 0, false)?;
            return Ok(id);
        }

        let id = self.next_packet_id();

        let count = (total_len + max_payload - 1) / max_payload;
        debug!(
            "fragmenting {} bytes to {:?} into {} fragments (id {})",
            total_len, dst_addr, count, id
        );
        for (index, chunk) in buf.as_slice().chunks(max_payload).enumerate() {
            let offset = ((index * max_payload) >> 3) as u16;
            let more_fragments = index + 1 < count;
            let fragment = PacketBuf::with_headroom(DEFAULT_HEADROOM, chunk)?;
            self.fragment_out(fragment, dst_addr, protocol, id, offset, more_fragments)?;
        }
        Ok(id)
    }

    /// Prepend the header for one fragment and hand it to the link
    fn fragment_out(
        &mut self,
        mut buf: PacketBuf,
        dst_addr: [u8; 4],
        protocol: u8,
        id: u16,
        offset: u16,
        more_fragments: bool,
    ) -> Result<()> {
        let mut header = Ipv4Header::new_fragment(
            id,
            offset,
            more_fragments,
            self.config.ttl,
            protocol,
            self.config.ip,
            dst_addr,
            buf.len() as u16,
        );
        header.update_checksum();
        header.write_to(buf.push_header(IPV4_HEADER_LEN)?);

        trace!(
            "ip out: id {} offset {} mf {} len {} proto {}",
            id,
            offset,
            more_fragments,
            buf.len(),
            protocol
        );
        self.link.resolve_and_transmit(buf, dst_addr);
        Ok(())
    }
}

/// Everything a protocol handler may use while processing a packet
pub struct NetContext {
    pub(crate) ip: IpOutput,
    pub(crate) unreachable: Box<dyn Unreachable>,
}

impl NetContext {
    pub fn new(ip: IpOutput, unreachable: Box<dyn Unreachable>) -> Self {
        NetContext { ip, unreachable }
    }

    pub fn local_addr(&self) -> [u8; 4] {
        self.ip.local_addr()
    }

    pub fn ip_output(&mut self) -> &mut IpOutput {
        &mut self.ip
    }

    pub fn ip_out(&mut self, buf: PacketBuf, dst_addr: [u8; 4], protocol: u8) -> Result<u16> {
        self.ip.ip_out(buf, dst_addr, protocol)
    }

    /// Report that `original` could not be delivered
    ///
    /// `original` must start at the IP header of the offending datagram.
    pub fn signal_unreachable(
        &mut self,
        original: &PacketBuf,
        dst_addr: [u8; 4],
        code: UnreachableCode,
    ) {
        debug!("signalling {:?} to {:?}", code, dst_addr);
        self.unreachable
            .signal(&mut self.ip, original, dst_addr, code);
    }

    /// Copy `data` into a new segment and send it over UDP
    pub fn udp_send(
        &mut self,
        data: &[u8],
        src_port: u16,
        dst_addr: [u8; 4],
        dst_port: u16,
    ) -> Result<()> {
        let buf = PacketBuf::with_headroom(DEFAULT_HEADROOM, data)?;
        if let Err(e) = udp::udp_out(&mut self.ip, buf, src_port, dst_addr, dst_port) {
            warn!("udp send to {:?}:{} failed: {}", dst_addr, dst_port, e);
            return Err(e);
        }
        Ok(())
    }
}
