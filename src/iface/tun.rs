//! TUN device link
//!
//! A TUN device carries bare IP datagrams over a point-to-point link, so
//! there is no hardware address to resolve: transmission is a single write.

use std::rc::Rc;

use log::{info, trace, warn};
use tun_tap::{Iface, Mode};

use crate::buffer::PacketBuf;
use crate::error::Result;
use crate::iface::interface::NetStack;
use crate::iface::ip::LinkOutput;

/// Handle on a TUN device; clones share the device
#[derive(Clone)]
pub struct TunLink {
    iface: Rc<Iface>,
}

impl TunLink {
    /// Open (or create) the TUN device `name` without packet-info headers
    pub fn open(name: &str) -> Result<Self> {
        let iface = Iface::without_packet_info(name, Mode::Tun)?;
        info!("opened tun device {}", iface.name());
        Ok(TunLink {
            iface: Rc::new(iface),
        })
    }

    pub fn name(&self) -> &str {
        self.iface.name()
    }

    /// Block until the next datagram arrives
    pub fn recv_frame(&self, mtu: usize) -> Result<PacketBuf> {
        let mut frame = vec![0u8; mtu];
        let nbytes = self.iface.recv(&mut frame)?;
        trace!("tun rx {} bytes", nbytes);
        PacketBuf::from_frame(&frame[..nbytes])
    }
}

impl LinkOutput for TunLink {
    fn resolve_and_transmit(&mut self, frame: PacketBuf, dst_addr: [u8; 4]) {
        match self.iface.send(frame.as_slice()) {
            Ok(nbytes) => trace!("tun tx {} bytes to {:?}", nbytes, dst_addr),
            Err(e) => warn!("tun send to {:?} failed: {}", dst_addr, e),
        }
    }
}

impl NetStack {
    /// Feed every datagram read from `tun` into the stack until a read fails
    pub fn run_tun(&mut self, tun: &TunLink) -> Result<()> {
        let mtu = self.config().mtu;
        loop {
            let frame = tun.recv_frame(mtu)?;
            self.ip_in(frame, None);
        }
    }
}
