//! Inbound IPv4 processing
//!
//! Every malformed datagram is dropped silently (a debug record at most).
//! Datagrams for a protocol nobody handles are answered with a protocol
//! unreachable signal.

use log::{debug, trace};

use crate::buffer::PacketBuf;
use crate::iface::interface::NetStack;
use crate::iface::IpHandler;
use crate::network::icmp::UnreachableCode;
use crate::network::ipv4::{verify_header_checksum, Ipv4Header, Ipv4Meta, IPV4_HEADER_LEN};

impl NetStack {
    /// Process one received IPv4 datagram
    ///
    /// `buf` must start at the IP header. `src_mac` is the link-layer sender,
    /// when the link has one; it is only logged.
    pub fn ip_in(&mut self, mut buf: PacketBuf, src_mac: Option<[u8; 6]>) {
        let ip_header = match Ipv4Header::from_bytes(buf.as_slice()) {
            Some(header) => header,
            None => {
                trace!("dropping non-IPv4 or short frame ({} bytes)", buf.len());
                return;
            }
        };

        let total_len = ip_header.total_len as usize;
        let header_len = ip_header.header_len();
        if total_len > buf.len() || header_len < IPV4_HEADER_LEN || header_len > total_len {
            debug!(
                "bad lengths: total {} header {} frame {}",
                total_len,
                header_len,
                buf.len()
            );
            return;
        }

        if !verify_header_checksum(buf.as_slice(), header_len) {
            debug!("ipv4 header checksum mismatch from {:?}", ip_header.src_addr);
            return;
        }

        if ip_header.dst_addr != self.ctx.local_addr() {
            trace!("not for us: {:?}", ip_header.dst_addr);
            return;
        }

        if ip_header.is_fragment() {
            debug!(
                "dropping fragment id {} offset {} from {:?}: no reassembly",
                ip_header.id,
                ip_header.fragment_offset(),
                ip_header.src_addr
            );
            return;
        }

        buf.truncate(total_len);

        trace!(
            "ip in: {:?} -> {:?} proto {} len {} (mac {:?})",
            ip_header.src_addr,
            ip_header.dst_addr,
            ip_header.protocol,
            total_len,
            src_mac
        );

        if !self.protocols.contains(ip_header.protocol) {
            debug!("no handler for protocol {}", ip_header.protocol);
            self.ctx.signal_unreachable(
                &buf,
                ip_header.src_addr,
                UnreachableCode::ProtocolUnreachable,
            );
            return;
        }

        if buf.pull_header(header_len).is_err() {
            return;
        }

        let meta = Ipv4Meta {
            src_addr: ip_header.src_addr,
            dst_addr: ip_header.dst_addr,
            protocol: ip_header.protocol,
            header_len,
        };
        let ctx = &mut self.ctx;
        let delivered = self
            .protocols
            .dispatch(ip_header.protocol, buf, |handler, payload| {
                handler.ip_in(ctx, payload, &meta)
            });
        if delivered.is_err() {
            debug!("protocol {} vanished during dispatch", ip_header.protocol);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InterfaceConfig;
    use crate::iface::ip::{CaptureLink, IpOutput, NetContext};
    use crate::iface::ProtocolHandler;
    use crate::network::icmp::Unreachable;
    use crate::network::ipv4::protocol;
    use std::cell::RefCell;
    use std::rc::Rc;

    const LOCAL: [u8; 4] = [10, 0, 0, 1];
    const PEER: [u8; 4] = [10, 0, 0, 2];

    #[derive(Clone, Default)]
    struct Recorder {
        seen: Rc<RefCell<Vec<(Vec<u8>, Ipv4Meta)>>>,
    }

    impl IpHandler for Recorder {
        fn ip_in(&mut self, _ctx: &mut NetContext, buf: PacketBuf, meta: &Ipv4Meta) {
            self.seen.borrow_mut().push((buf.as_slice().to_vec(), *meta));
        }
    }

    #[derive(Clone, Default)]
    struct Signals {
        codes: Rc<RefCell<Vec<(UnreachableCode, [u8; 4], usize)>>>,
    }

    impl Unreachable for Signals {
        fn signal(
            &mut self,
            _ip: &mut IpOutput,
            original: &PacketBuf,
            dst_addr: [u8; 4],
            code: UnreachableCode,
        ) {
            self.codes
                .borrow_mut()
                .push((code, dst_addr, original.len()));
        }
    }

    fn stack() -> (NetStack, Recorder, Signals) {
        let recorder = Recorder::default();
        let signals = Signals::default();
        let mut stack = NetStack::new(InterfaceConfig::with_ip(LOCAL), Box::new(CaptureLink::new()))
            .unwrap()
            .with_unreachable(Box::new(signals.clone()));
        stack
            .register_protocol(protocol::TCP, ProtocolHandler::Tcp(Box::new(recorder.clone())))
            .unwrap();
        (stack, recorder, signals)
    }

    fn datagram(proto: u8, dst: [u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut header =
            Ipv4Header::new_fragment(1, 0, false, 64, proto, PEER, dst, payload.len() as u16);
        header.update_checksum();
        let mut bytes = header.to_bytes().to_vec();
        bytes.extend_from_slice(payload);
        bytes
    }

    fn feed(stack: &mut NetStack, bytes: &[u8]) {
        stack.ip_in(PacketBuf::from_frame(bytes).unwrap(), None);
    }

    #[test]
    fn test_valid_datagram_reaches_handler() {
        let (mut stack, recorder, signals) = stack();
        feed(&mut stack, &datagram(protocol::TCP, LOCAL, b"segment"));

        let seen = recorder.seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, b"segment");
        assert_eq!(seen[0].1.src_addr, PEER);
        assert_eq!(seen[0].1.header_len, 20);
        assert!(signals.codes.borrow().is_empty());
    }

    #[test]
    fn test_trailing_padding_is_stripped() {
        let (mut stack, recorder, _) = stack();
        let mut bytes = datagram(protocol::TCP, LOCAL, b"abc");
        bytes.extend_from_slice(&[0u8; 17]);
        feed(&mut stack, &bytes);
        assert_eq!(recorder.seen.borrow()[0].0, b"abc");
    }

    #[test]
    fn test_destination_mismatch_in_any_byte_is_dropped() {
        let (mut stack, recorder, signals) = stack();
        for i in 0..4 {
            let mut dst = LOCAL;
            dst[i] ^= 0x80;
            feed(&mut stack, &datagram(protocol::TCP, dst, b"x"));
        }
        assert!(recorder.seen.borrow().is_empty());
        assert!(signals.codes.borrow().is_empty());
    }

    #[test]
    fn test_malformed_datagrams_are_dropped_silently() {
        let (mut stack, recorder, signals) = stack();

        feed(&mut stack, &[0x45; 19]);

        let mut wrong_version = datagram(protocol::TCP, LOCAL, b"x");
        wrong_version[0] = 0x65;
        feed(&mut stack, &wrong_version);

        let mut too_long = datagram(protocol::TCP, LOCAL, b"x");
        too_long[3] += 10;
        feed(&mut stack, &too_long);

        let mut bad_checksum = datagram(protocol::TCP, LOCAL, b"x");
        bad_checksum[10] ^= 0xFF;
        feed(&mut stack, &bad_checksum);

        assert!(recorder.seen.borrow().is_empty());
        assert!(signals.codes.borrow().is_empty());
    }

    #[test]
    fn test_unknown_protocol_signals_once() {
        let (mut stack, recorder, signals) = stack();
        feed(&mut stack, &datagram(200, LOCAL, b"mystery"));

        let codes = signals.codes.borrow();
        assert_eq!(codes.len(), 1);
        assert_eq!(codes[0].0, UnreachableCode::ProtocolUnreachable);
        assert_eq!(codes[0].1, PEER);
        // the signal sees the datagram from its IP header on
        assert_eq!(codes[0].2, 20 + 7);
        assert!(recorder.seen.borrow().is_empty());
    }

    #[test]
    fn test_tcp_without_handler_signals_protocol_unreachable() {
        let (mut stack, recorder, signals) = stack();
        stack.unregister_protocol(protocol::TCP);
        feed(&mut stack, &datagram(protocol::TCP, LOCAL, b"syn"));

        let codes = signals.codes.borrow();
        assert_eq!(codes.len(), 1);
        assert_eq!(codes[0].0, UnreachableCode::ProtocolUnreachable);
        assert_eq!(codes[0].1, PEER);
        assert!(recorder.seen.borrow().is_empty());
    }

    #[test]
    fn test_inbound_fragments_are_not_delivered() {
        let (mut stack, recorder, _) = stack();
        let mut header = Ipv4Header::new_fragment(5, 0, true, 64, protocol::TCP, PEER, LOCAL, 8);
        header.update_checksum();
        let mut bytes = header.to_bytes().to_vec();
        bytes.extend_from_slice(&[1u8; 8]);
        feed(&mut stack, &bytes);
        assert!(recorder.seen.borrow().is_empty());
    }

    #[test]
    fn test_header_with_options_is_skipped() {
        let (mut stack, recorder, _) = stack();
        let mut header = Ipv4Header::new_fragment(1, 0, false, 64, protocol::TCP, PEER, LOCAL, 7);
        header.ihl = 6;
        header.total_len = 24 + 3;
        let mut bytes = header.to_bytes().to_vec();
        bytes.extend_from_slice(&[1, 1, 1, 0]); // NOP NOP NOP END
        bytes.extend_from_slice(b"opt");
        let sum = crate::network::checksum(&bytes[..24]);
        bytes[10..12].copy_from_slice(&sum.to_be_bytes());

        feed(&mut stack, &bytes);
        let seen = recorder.seen.borrow();
        assert_eq!(seen[0].0, b"opt");
        assert_eq!(seen[0].1.header_len, 24);
    }
}
