use std::net::Ipv4Addr;

use anyhow::{Context, bail};
use pnet::packet::Packet;
use pnet::packet::arp::{ArpHardwareTypes, ArpOperations, ArpPacket, MutableArpPacket};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket, MutableEthernetPacket};
use pnet::util::MacAddr;

pub const ETH_HDR_LEN: usize = 14;
pub const ARP_LEN: usize = 28;
pub const MIN_ETH_FRAME_NO_FCS: usize = 60;

/// Broadcast `who-has dst_addr tell src_addr` frame.
pub fn create_request(
    src_mac: MacAddr,
    src_addr: Ipv4Addr,
    dst_addr: Ipv4Addr,
) -> anyhow::Result<Vec<u8>> {
    let mut buffer = [0u8; MIN_ETH_FRAME_NO_FCS];

    {
        let mut eth = MutableEthernetPacket::new(&mut buffer[..])
            .context("failed to create mutable Ethernet packet")?;
        eth.set_source(src_mac);
        eth.set_destination(MacAddr::broadcast());
        eth.set_ethertype(EtherTypes::Arp);
    }

    let mut arp = MutableArpPacket::new(&mut buffer[ETH_HDR_LEN..ETH_HDR_LEN + ARP_LEN])
        .context("failed to create mutable ARP packet")?;
    arp.set_hardware_type(ArpHardwareTypes::Ethernet);
    arp.set_protocol_type(EtherTypes::Ipv4);
    arp.set_hw_addr_len(6);
    arp.set_proto_addr_len(4);
    arp.set_operation(ArpOperations::Request);
    arp.set_sender_hw_addr(src_mac);
    arp.set_target_hw_addr(MacAddr::zero());
    arp.set_sender_proto_addr(src_addr);
    arp.set_target_proto_addr(dst_addr);

    Ok(Vec::from(buffer))
}

/// Sender `(ip, mac)` of an ARP reply frame.
pub fn parse_reply(frame: &[u8]) -> anyhow::Result<(Ipv4Addr, MacAddr)> {
    let eth = EthernetPacket::new(frame).context("frame shorter than an Ethernet header")?;
    if eth.get_ethertype() != EtherTypes::Arp {
        bail!("not an ARP frame (ethertype {})", eth.get_ethertype());
    }
    let arp = ArpPacket::new(eth.payload()).context(format!(
        "truncated or invalid ARP packet (payload len {})",
        eth.payload().len()
    ))?;
    if arp.get_operation() != ArpOperations::Reply {
        bail!("ARP operation is not a reply");
    }
    Ok((arp.get_sender_proto_addr(), arp.get_sender_hw_addr()))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
