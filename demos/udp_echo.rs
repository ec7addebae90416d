mod utils;

use netstack_lite::{InterfaceConfig, NetContext, NetStack, PacketBuf, TunLink, UdpMeta};
use utils::network::{configure_interface, init_logging};

const ECHO_PORT: u16 = 7;

fn main() -> netstack_lite::Result<()> {
    init_logging();

    let tun_name = "tun0";
    let tun = TunLink::open(tun_name)?;
    configure_interface(tun.name(), "10.0.0.254/24")?;

    let config = InterfaceConfig::with_ip([10, 0, 0, 1]);
    let mut stack = NetStack::new(config, Box::new(tun.clone()))?;

    stack.udp_open(
        ECHO_PORT,
        |ctx: &mut NetContext, payload: PacketBuf, meta: &UdpMeta| {
            if let Err(e) = ctx.udp_send(payload.as_slice(), ECHO_PORT, meta.src_addr, meta.src_port) {
                log::warn!("echo to {:?}:{} dropped: {}", meta.src_addr, meta.src_port, e);
            }
        },
    )?;

    log::info!("udp echo listening on 10.0.0.1:{}", ECHO_PORT);
    stack.run_tun(&tun)
}
