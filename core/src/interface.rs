//! Local interface, address and gateway resolution from `ip(8)`.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use pnet::ipnetwork::Ipv4Network;
use tracing::{debug, warn};

use lanscope_common::error::DiscoveryError;
use lanscope_common::network::interface::{NetworkInterface, is_valid_interface_name, prefix_to_netmask};
use lanscope_common::network::range;
use lanscope_protocols::iproute;

use crate::system::CommandRunner;

const IP_TIMEOUT: Duration = Duration::from_secs(30);

/// Prefix assumed when `ip addr` reports no IPv4 address.
const FALLBACK_PREFIX: u8 = 24;

/// One interface as seen at resolution time, plus what the scan needs
/// to know about its subnet.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInterface {
    pub interface: NetworkInterface,
    /// Empty when no route through this interface names a next hop.
    pub gateway_ip: String,
    pub prefix_len: u8,
}

impl ResolvedInterface {
    pub fn has_ipv4(&self) -> bool {
        !self.interface.ip.is_empty()
    }

    /// The subnet to sweep, `None` when the interface has no IPv4 address.
    pub fn network(&self) -> Option<Ipv4Network> {
        let ip: Ipv4Addr = self.interface.ip.parse().ok()?;
        range::subnet_of(ip, self.prefix_len).ok()
    }
}

pub struct InterfaceResolver {
    runner: Arc<dyn CommandRunner>,
}

impl InterfaceResolver {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Resolves `requested`, or the first default-route interface when `None`.
    ///
    /// Fails only when there is nothing to resolve or the name is unsafe to
    /// hand to `ip(8)`; a missing address or gateway is reported through
    /// empty fields instead.
    pub async fn resolve(&self, requested: Option<&str>) -> Result<ResolvedInterface, DiscoveryError> {
        let routes_out = self.ip(&["-4", "route", "show", "default"]).await;
        let routes = iproute::parse_default_routes(&routes_out);
        let default_iface = routes.first().map(|r| r.dev.clone());

        let name = match requested.map(str::to_string).or(default_iface.clone()) {
            Some(name) if !name.is_empty() => name,
            _ => return Err(DiscoveryError::NoInterface(requested.map(str::to_string))),
        };

        if !is_valid_interface_name(&name) {
            return Err(DiscoveryError::InvalidInterfaceName(name));
        }

        let mut gateway_ip = routes
            .iter()
            .find(|r| r.dev == name)
            .map(|r| r.gateway.clone())
            .unwrap_or_default();
        if gateway_ip.is_empty() {
            let dev_routes = self.ip(&["-4", "route", "show", "dev", &name]).await;
            gateway_ip = iproute::parse_dev_gateway(&dev_routes).unwrap_or_default();
        }

        let addr_out = self.ip(&["-4", "addr", "show", "dev", &name]).await;
        let (ip, prefix_len, netmask) = match iproute::parse_inet(&addr_out) {
            Some((ip, prefix)) => (ip.to_string(), prefix, prefix_to_netmask(prefix).to_string()),
            None => {
                debug!("{name}: no IPv4 address reported");
                (String::new(), FALLBACK_PREFIX, String::new())
            }
        };

        let link_out = self.ip(&["link", "show", "dev", &name]).await;
        let mac = iproute::parse_link_mac(&link_out).unwrap_or_default();
        if mac.is_empty() {
            warn!("{name}: no hardware address found");
        }

        let is_default = default_iface.as_deref() == Some(name.as_str());
        Ok(ResolvedInterface {
            interface: NetworkInterface {
                name,
                ip,
                netmask,
                mac,
                is_default,
            },
            gateway_ip,
            prefix_len,
        })
    }

    async fn ip(&self, args: &[&str]) -> String {
        self.runner
            .output("ip", args, IP_TIMEOUT)
            .await
            .unwrap_or_default()
    }
}
