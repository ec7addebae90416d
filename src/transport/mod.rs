//! Transport layer protocols implementation
//!
//! This module contains implementations for transport layer protocols:
//! - UDP: User Datagram Protocol
//!
//! TCP plugs in from outside through [`ProtocolHandler::Tcp`](crate::iface::ProtocolHandler).

pub mod udp;

// Re-export commonly used items
pub use udp::{udp_out, UdpHandler, UdpHeader, UdpMeta, UdpModule};
