//! Parsers for `ip(8)` output: route, addr, link and neigh dumps.

use std::net::Ipv4Addr;

use once_cell::sync::Lazy;
use regex::Regex;

use lanscope_common::network::mac::normalize_mac;

static DEFAULT_ROUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^default via (\S+) dev (\S+)").expect("invalid regex"));
static VIA: Lazy<Regex> = Lazy::new(|| Regex::new(r"via (\S+)").expect("invalid regex"));
static INET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^inet (\S+)/(\d+)").expect("invalid regex"));
static LINK_ETHER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"link/ether ([0-9a-f:]{17})").expect("invalid regex"));
static NEIGH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\S+)\s+lladdr\s+([0-9a-f:]{17})\s+\S+").expect("invalid regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultRoute {
    pub gateway: String,
    pub dev: String,
}

/// `ip -4 route show default`, in table order.
pub fn parse_default_routes(output: &str) -> Vec<DefaultRoute> {
    output
        .lines()
        .filter_map(|line| DEFAULT_ROUTE.captures(line.trim()))
        .map(|caps| DefaultRoute {
            gateway: caps[1].to_string(),
            dev: caps[2].to_string(),
        })
        .collect()
}

/// First `via` next-hop in `ip -4 route show dev <iface>`.
pub fn parse_dev_gateway(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| VIA.captures(line).map(|caps| caps[1].to_string()))
}

/// First IPv4 address and prefix length in `ip -4 addr show dev <iface>`.
pub fn parse_inet(output: &str) -> Option<(Ipv4Addr, u8)> {
    output.lines().find_map(|line| {
        let caps = INET.captures(line.trim())?;
        let ip = caps[1].parse::<Ipv4Addr>().ok()?;
        let prefix = caps[2].parse::<u8>().ok().filter(|p| *p <= 32)?;
        Some((ip, prefix))
    })
}

/// Hardware address in `ip link show dev <iface>`.
pub fn parse_link_mac(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| LINK_ETHER.captures(line).map(|caps| caps[1].to_string()))
}

/// `(ip, mac)` pairs from `ip -4 neigh show dev <iface>`. Entries without a
/// link-layer address (FAILED, INCOMPLETE) are dropped.
pub fn parse_neighbors(output: &str) -> Vec<(String, String)> {
    output
        .lines()
        .filter_map(|line| {
            let caps = NEIGH.captures(line.trim())?;
            caps[1].parse::<Ipv4Addr>().ok()?;
            Some((caps[1].to_string(), normalize_mac(&caps[2])))
        })
        .collect()
}
