//! The network stack object
//!
//! `NetStack` owns every piece of mutable state: interface configuration,
//! the datagram id counter, the link, the unreachable signaller and the
//! protocol table. Nothing is global, so independent stacks can coexist.

use log::debug;

use crate::buffer::PacketBuf;
use crate::config::{InterfaceConfig, DEFAULT_HEADROOM};
use crate::error::{Result, StackError};
use crate::iface::dispatch::DispatchTable;
use crate::iface::ip::{IpOutput, LinkOutput, NetContext};
use crate::iface::IpHandler;
use crate::network::icmp::{IcmpModule, IcmpUnreachable, Unreachable};
use crate::network::ipv4::{protocol, Ipv4Meta};
use crate::transport::udp::{UdpHandler, UdpModule};

/// Value stored in the protocol table, one variant per upper protocol
pub enum ProtocolHandler {
    Icmp(Box<dyn IpHandler>),
    Udp(UdpModule),
    Tcp(Box<dyn IpHandler>),
    Other(Box<dyn IpHandler>),
}

impl IpHandler for ProtocolHandler {
    fn ip_in(&mut self, ctx: &mut NetContext, buf: PacketBuf, meta: &Ipv4Meta) {
        match self {
            ProtocolHandler::Udp(udp) => udp.ip_in(ctx, buf, meta),
            ProtocolHandler::Icmp(handler)
            | ProtocolHandler::Tcp(handler)
            | ProtocolHandler::Other(handler) => handler.ip_in(ctx, buf, meta),
        }
    }
}

/// Host-side IPv4 stack bound to one interface
pub struct NetStack {
    pub(crate) ctx: NetContext,
    pub(crate) protocols: DispatchTable<u8, ProtocolHandler>,
}

impl NetStack {
    /// Create a stack with the built-in ICMP and UDP handlers registered
    pub fn new(config: InterfaceConfig, link: Box<dyn LinkOutput>) -> Result<Self> {
        let ip = IpOutput::new(config, link)?;
        let port_capacity = ip.config().port_capacity;
        let mut protocols = DispatchTable::with_capacity(ip.config().protocol_capacity);
        protocols.register(protocol::ICMP, ProtocolHandler::Icmp(Box::new(IcmpModule)))?;
        protocols.register(protocol::UDP, ProtocolHandler::Udp(UdpModule::new(port_capacity)))?;

        debug!("stack up on {:?} (mtu {})", ip.local_addr(), ip.config().mtu);
        Ok(NetStack {
            ctx: NetContext::new(ip, Box::new(IcmpUnreachable)),
            protocols,
        })
    }

    /// Replace the default ICMP unreachable signaller
    pub fn with_unreachable(mut self, unreachable: Box<dyn Unreachable>) -> Self {
        self.ctx.unreachable = unreachable;
        self
    }

    pub fn config(&self) -> &InterfaceConfig {
        self.ctx.ip.config()
    }

    pub fn context_mut(&mut self) -> &mut NetContext {
        &mut self.ctx
    }

    /// Install a handler for an IP protocol number, replacing any existing one
    pub fn register_protocol(&mut self, number: u8, handler: ProtocolHandler) -> Result<()> {
        if self.protocols.register(number, handler)?.is_some() {
            debug!("protocol {} handler replaced", number);
        }
        Ok(())
    }

    pub fn unregister_protocol(&mut self, number: u8) -> Option<ProtocolHandler> {
        self.protocols.unregister(number)
    }

    /// Send `buf` as an IP datagram; see [`IpOutput::ip_out`]
    pub fn ip_out(&mut self, buf: PacketBuf, dst_addr: [u8; 4], protocol: u8) -> Result<u16> {
        self.ctx.ip_out(buf, dst_addr, protocol)
    }

    fn udp_mut(&mut self) -> Result<&mut UdpModule> {
        match self.protocols.get_mut(protocol::UDP) {
            Some(ProtocolHandler::Udp(udp)) => Ok(udp),
            _ => Err(StackError::InvalidConfig("UDP is not registered")),
        }
    }

    /// Bind a handler to a UDP port
    pub fn udp_open<H>(&mut self, port: u16, handler: H) -> Result<()>
    where
        H: UdpHandler + 'static,
    {
        self.udp_mut()?.open(port, Box::new(handler))
    }

    pub fn udp_close(&mut self, port: u16) {
        if let Ok(udp) = self.udp_mut() {
            udp.close(port);
        }
    }

    /// Send `data` from `src_port` to `dst_addr:dst_port`
    pub fn udp_send(
        &mut self,
        data: &[u8],
        src_port: u16,
        dst_addr: [u8; 4],
        dst_port: u16,
    ) -> Result<()> {
        self.ctx.udp_send(data, src_port, dst_addr, dst_port)
    }

    /// Reserve room for headers when the caller builds its own buffers
    pub fn alloc_tx(&self, payload: &[u8]) -> Result<PacketBuf> {
        PacketBuf::with_headroom(DEFAULT_HEADROOM, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iface::ip::CaptureLink;
    use crate::transport::udp::UdpMeta;

    fn stack() -> (NetStack, CaptureLink) {
        let link = CaptureLink::new();
        let stack = NetStack::new(InterfaceConfig::with_ip([10, 0, 0, 1]), Box::new(link.clone()))
            .unwrap();
        (stack, link)
    }

    #[test]
    fn test_builtin_protocols_registered() {
        let (stack, _) = stack();
        assert!(stack.protocols.contains(protocol::ICMP));
        assert!(stack.protocols.contains(protocol::UDP));
        assert!(!stack.protocols.contains(protocol::TCP));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = InterfaceConfig {
            mtu: 20,
            ..InterfaceConfig::default()
        };
        let result = NetStack::new(config, Box::new(CaptureLink::new()));
        assert!(matches!(result, Err(StackError::InvalidConfig(_))));
    }

    #[test]
    fn test_udp_open_after_udp_unregistered_fails() {
        let (mut stack, _) = stack();
        stack.unregister_protocol(protocol::UDP);
        let result = stack.udp_open(7, |_: &mut NetContext, _: PacketBuf, _: &UdpMeta| {});
        assert!(result.is_err());
    }

    #[test]
    fn test_udp_send_goes_to_link() {
        let (mut stack, link) = stack();
        stack.udp_send(b"hi", 1234, [10, 0, 0, 9], 9).unwrap();
        let frames = link.take();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].1, [10, 0, 0, 9]);
        assert_eq!(frames[0].0.len(), 20 + 8 + 2);
    }
}
