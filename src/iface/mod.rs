//! Network interface abstraction layer
//!
//! This module ties the layers together for the single interface the stack
//! serves:
//! - Protocol dispatch table
//! - Inbound IPv4 validation and demultiplexing
//! - Outbound IPv4 fragmentation and link hand-off
//! - TUN device link

pub mod dispatch;
pub mod interface;
pub mod ip;
pub mod ipv4;
pub mod tun;

use crate::buffer::PacketBuf;
use crate::network::ipv4::Ipv4Meta;

// Re-export commonly used items
pub use dispatch::DispatchTable;
pub use interface::{NetStack, ProtocolHandler};
pub use ip::{CaptureLink, IpOutput, LinkOutput, NetContext};
pub use tun::TunLink;

/// Receive side of an upper-layer protocol (ICMP, UDP, TCP, ...)
///
/// `buf` starts at the protocol's own header; the IP header sits in the
/// headroom right in front of it, `meta.header_len` bytes long.
pub trait IpHandler {
    fn ip_in(&mut self, ctx: &mut NetContext, buf: PacketBuf, meta: &Ipv4Meta);
}
