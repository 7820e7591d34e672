//! Active ARP sweep over a raw Ethernet channel.
//!
//! Needs root and a working datalink channel; when either is missing the
//! sweep reports itself unavailable and the scanner falls back to the
//! neighbor cache and ping.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use async_trait::async_trait;
use pnet::datalink::{self, Channel, Config, DataLinkReceiver, DataLinkSender, NetworkInterface};
use pnet::ipnetwork::Ipv4Network;
use tracing::{debug, info, warn};

use lanscope_common::network::mac::mac_to_string;
use lanscope_common::network::range;
use lanscope_protocols::arp;

/// Cap on probes sent in one sweep.
const MAX_PROBES: usize = 4096;

#[async_trait]
pub trait ArpSweep: Send + Sync {
    /// `(ip, mac)` replies seen within `window`, or `None` when link-layer
    /// capture is not possible on this host.
    async fn sweep(
        &self,
        interface: &str,
        source: Ipv4Addr,
        network: Ipv4Network,
        window: Duration,
    ) -> Option<Vec<(String, String)>>;
}

/// Stand-in when raw capture is known to be unavailable.
pub struct NoArpSweep;

#[async_trait]
impl ArpSweep for NoArpSweep {
    async fn sweep(
        &self,
        _interface: &str,
        _source: Ipv4Addr,
        _network: Ipv4Network,
        _window: Duration,
    ) -> Option<Vec<(String, String)>> {
        None
    }
}

pub struct PnetArpSweep;

#[async_trait]
impl ArpSweep for PnetArpSweep {
    async fn sweep(
        &self,
        interface: &str,
        source: Ipv4Addr,
        network: Ipv4Network,
        window: Duration,
    ) -> Option<Vec<(String, String)>> {
        if !is_root::is_root() {
            info!("Not running as root, using ARP table + ping sweep fallback");
            return None;
        }

        let name = interface.to_string();
        let task = tokio::task::spawn_blocking(move || blocking_sweep(&name, source, network, window));
        match task.await {
            Ok(Ok(found)) => Some(found),
            Ok(Err(e)) => {
                info!("Link-layer capture unavailable ({e:#}), using ARP table + ping sweep fallback");
                None
            }
            Err(e) => {
                warn!("ARP sweep task failed: {e}");
                None
            }
        }
    }
}

fn blocking_sweep(
    name: &str,
    source: Ipv4Addr,
    network: Ipv4Network,
    window: Duration,
) -> anyhow::Result<Vec<(String, String)>> {
    let intf = datalink::interfaces()
        .into_iter()
        .find(|i| i.name == name)
        .with_context(|| format!("interface {name} not visible to the datalink layer"))?;
    let src_mac = intf.mac.with_context(|| format!("{name} has no hardware address"))?;

    let (mut tx, mut rx) = open_eth_channel(&intf, &channel_config(), datalink::channel)?;

    info!("ARP scanning {network} via raw socket...");
    let targets = range::host_addresses(network, MAX_PROBES);
    for target in targets.into_iter().filter(|t| *t != source) {
        let frame = arp::create_request(src_mac, source, target)?;
        if let Some(Err(e)) = tx.send_to(&frame, None) {
            debug!("ARP probe to {target} not sent: {e}");
        }
    }

    let found = listen_for_replies(&mut *rx, network, window);
    info!("Found {} hosts via ARP scan", found.len());
    Ok(found)
}

fn channel_config() -> Config {
    Config {
        read_timeout: Some(Duration::from_millis(50)),
        ..Default::default()
    }
}

fn open_eth_channel<F>(
    intf: &NetworkInterface,
    cfg: &Config,
    channel_opener: F,
) -> anyhow::Result<(Box<dyn DataLinkSender>, Box<dyn DataLinkReceiver>)>
where
    F: FnOnce(&NetworkInterface, Config) -> std::io::Result<Channel>,
{
    let ch = channel_opener(intf, *cfg).with_context(|| format!("opening on {}", intf.name))?;
    match ch {
        Channel::Ethernet(tx, rx) => Ok((tx, rx)),
        _ => bail!("non-ethernet channel for {}", intf.name),
    }
}

fn listen_for_replies(
    rx: &mut dyn DataLinkReceiver,
    network: Ipv4Network,
    window: Duration,
) -> Vec<(String, String)> {
    let mut found = BTreeMap::new();
    let deadline = Instant::now() + window;
    while Instant::now() < deadline {
        if let Ok(frame) = rx.next() {
            absorb_frame(frame, network, &mut found);
        }
    }
    found.into_iter().map(|(ip, mac)| (ip.to_string(), mac)).collect()
}

/// Records the sender of an in-subnet ARP reply; first reply per IP wins.
fn absorb_frame(frame: &[u8], network: Ipv4Network, found: &mut BTreeMap<Ipv4Addr, String>) {
    let Ok((ip, mac)) = arp::parse_reply(frame) else {
        return;
    };
    if network.contains(ip) {
        found.entry(ip).or_insert_with(|| mac_to_string(mac));
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
