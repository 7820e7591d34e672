use std::net::Ipv4Addr;

use pnet::ipnetwork::Ipv4Network;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Range {
    pub start_addr: Ipv4Addr,
    pub end_addr: Ipv4Addr,
}

impl Ipv4Range {
    pub fn new(start_addr: Ipv4Addr, end_addr: Ipv4Addr) -> Self {
        Self {
            start_addr,
            end_addr,
        }
    }

    pub fn to_iter(&self) -> impl Iterator<Item = Ipv4Addr> {
        let start: u32 = self.start_addr.into();
        let end: u32 = self.end_addr.into();
        (start..=end).map(Ipv4Addr::from)
    }
}

/// The network a host address belongs to, e.g. `192.168.1.23/24` -> `192.168.1.0/24`.
pub fn subnet_of(ip: Ipv4Addr, prefix: u8) -> anyhow::Result<Ipv4Network> {
    let net = Ipv4Network::new(ip, prefix)?;
    Ok(Ipv4Network::new(net.network(), prefix)?)
}

/// Usable host addresses of a network (network and broadcast excluded for
/// prefixes shorter than /31), capped at `limit`.
pub fn host_addresses(net: Ipv4Network, limit: usize) -> Vec<Ipv4Addr> {
    let network: u32 = net.network().into();
    let broadcast: u32 = net.broadcast().into();
    let range = if net.prefix() >= 31 {
        Ipv4Range::new(Ipv4Addr::from(network), Ipv4Addr::from(broadcast))
    } else {
        Ipv4Range::new(
            Ipv4Addr::from(network.saturating_add(1)),
            Ipv4Addr::from(broadcast.saturating_sub(1)),
        )
    };
    range.to_iter().take(limit).collect()
}
