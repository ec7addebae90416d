//! Interface configuration
//!
//! The interface address and MAC are fixed when the stack is built. The
//! `test-config` cargo feature swaps the deployment address set for the one
//! used in packet-capture tests.

use crate::error::{Result, StackError};

/// Ethernet maximum transmission unit
pub const ETHERNET_MTU: usize = 1500;

/// Minimum MTU every IPv4 link must support (RFC 791)
pub const IPV4_MIN_MTU: usize = 68;

/// Time-to-live written into every outbound datagram
pub const IP_DEFAULT_TTL: u8 = 64;

/// Largest buffer the stack will allocate
pub const BUF_MAX_LEN: usize = 2 * u16::MAX as usize + u8::MAX as usize;

/// Headroom reserved on the TX path for IP plus link headers
pub const DEFAULT_HEADROOM: usize = 64;

/// Default bound of the protocol-number table
pub const DEFAULT_PROTOCOL_CAPACITY: usize = 16;

/// Default bound of the UDP port table
pub const DEFAULT_PORT_CAPACITY: usize = 64;

#[cfg(feature = "test-config")]
mod addrs {
    pub const NET_IF_IP: [u8; 4] = [192, 168, 163, 103];
    pub const NET_IF_MAC: [u8; 6] = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66];
}

#[cfg(not(feature = "test-config"))]
mod addrs {
    pub const NET_IF_IP: [u8; 4] = [10, 250, 123, 233];
    pub const NET_IF_MAC: [u8; 6] = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];
}

pub use addrs::{NET_IF_IP, NET_IF_MAC};

/// Static description of the single interface this stack serves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceConfig {
    /// Interface IPv4 address
    pub ip: [u8; 4],
    /// Interface MAC address
    pub mac: [u8; 6],
    /// Link MTU, including the IP header
    pub mtu: usize,
    pub ttl: u8,
    /// Maximum number of registered upper-layer protocols
    pub protocol_capacity: usize,
    /// Maximum number of open UDP ports
    pub port_capacity: usize,
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        InterfaceConfig {
            ip: NET_IF_IP,
            mac: NET_IF_MAC,
            mtu: ETHERNET_MTU,
            ttl: IP_DEFAULT_TTL,
            protocol_capacity: DEFAULT_PROTOCOL_CAPACITY,
            port_capacity: DEFAULT_PORT_CAPACITY,
        }
    }
}

impl InterfaceConfig {
    /// Default configuration with a different interface address
    pub fn with_ip(ip: [u8; 4]) -> Self {
        InterfaceConfig {
            ip,
            ..Self::default()
        }
    }

    /// Check that the configuration describes a usable IPv4 link
    pub fn validate(&self) -> Result<()> {
        if self.mtu < IPV4_MIN_MTU {
            return Err(StackError::InvalidConfig("mtu below the IPv4 minimum of 68"));
        }
        if self.mtu > BUF_MAX_LEN {
            return Err(StackError::InvalidConfig("mtu larger than the buffer limit"));
        }
        if self.protocol_capacity == 0 || self.port_capacity == 0 {
            return Err(StackError::InvalidConfig("table capacity must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = InterfaceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.mtu, 1500);
        assert_eq!(config.ttl, 64);
    }

    #[test]
    fn test_address_set_selection() {
        let config = InterfaceConfig::default();
        if cfg!(feature = "test-config") {
            assert_eq!(config.ip, [192, 168, 163, 103]);
        } else {
            assert_eq!(config.ip, [10, 250, 123, 233]);
            assert_eq!(config.mac, [0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        }
    }

    #[test]
    fn test_rejects_tiny_mtu() {
        let config = InterfaceConfig {
            mtu: 40,
            ..InterfaceConfig::default()
        };
        assert!(matches!(config.validate(), Err(StackError::InvalidConfig(_))));
    }
}
