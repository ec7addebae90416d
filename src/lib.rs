//! A minimal host-side IPv4/UDP stack
//!
//! This library provides the network layer for a single virtual interface:
//! - IPv4 validation, demultiplexing and outbound fragmentation
//! - UDP with pseudo-header checksums and per-port handlers
//! - ICMP echo replies and destination-unreachable signalling
//! - A TUN device link for running against a real kernel
//!
//! It is a host, not a router: datagrams for other addresses are dropped.

pub mod buffer;
pub mod config;
pub mod error;
pub mod iface;
pub mod network;
pub mod transport;

// Re-export commonly used types
pub use buffer::PacketBuf;
pub use config::InterfaceConfig;
pub use error::{Result, StackError};
pub use iface::{CaptureLink, IpHandler, LinkOutput, NetContext, NetStack, ProtocolHandler, TunLink};
pub use network::icmp::{IcmpUnreachable, Unreachable, UnreachableCode};
pub use network::ipv4::{Ipv4Header, Ipv4Meta};
pub use transport::udp::{UdpHandler, UdpHeader, UdpMeta};
