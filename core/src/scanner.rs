//! Host enumeration on one local subnet and per-host enrichment.
//!
//! Discovery prefers an active ARP sweep. Without link-layer capture it reads
//! the kernel neighbor cache, pings the subnet only when the cache is empty
//! and then reads the cache again, since the pings populate it.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use pnet::ipnetwork::Ipv4Network;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use lanscope_common::config::DiscoveryConfig;
use lanscope_common::network::category::categorize;
use lanscope_common::network::host::{DiscoveredHost, sort_hosts};
use lanscope_common::network::range;
use lanscope_common::vendors::VendorRepository;
use lanscope_protocols::iproute;
use lanscope_protocols::nmap::{self, NmapLine};

use crate::dns::ReverseDns;
use crate::interface::ResolvedInterface;
use crate::network::arp::ArpSweep;
use crate::system::CommandRunner;

const PING_POOL: usize = 50;
const PING_SWEEP_LIMIT: usize = 256;
const PING_TIMEOUT: Duration = Duration::from_secs(3);
const NEIGH_TIMEOUT: Duration = Duration::from_secs(30);
/// Added to the configured timeout for the whole-subnet fping run.
const FPING_GRACE: Duration = Duration::from_secs(30);
/// Added to the configured timeout for one nmap service scan.
const NMAP_GRACE: Duration = Duration::from_secs(60);

pub struct HostScanner {
    runner: Arc<dyn CommandRunner>,
    arp: Arc<dyn ArpSweep>,
    dns: Arc<dyn ReverseDns>,
    vendors: Arc<dyn VendorRepository>,
    timeout: Duration,
    use_nmap: bool,
    top_ports: u32,
}

impl HostScanner {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        arp: Arc<dyn ArpSweep>,
        dns: Arc<dyn ReverseDns>,
        vendors: Arc<dyn VendorRepository>,
        config: &DiscoveryConfig,
    ) -> Self {
        Self {
            runner,
            arp,
            dns,
            vendors,
            timeout: Duration::from_secs(config.timeout),
            use_nmap: config.use_nmap,
            top_ports: config.top_ports,
        }
    }

    /// Raw `(ip, mac)` pairs seen on the subnet behind `iface`.
    pub async fn scan_local_subnet(&self, iface: &ResolvedInterface) -> Vec<(String, String)> {
        let name = iface.interface.name.as_str();
        let (Some(network), Ok(source)) = (iface.network(), iface.interface.ip.parse::<Ipv4Addr>())
        else {
            warn!("{name}: no IPv4 subnet to scan");
            return Vec::new();
        };

        if let Some(found) = self.arp.sweep(name, source, network, self.timeout).await {
            return found;
        }
        self.fallback_scan(name, network).await
    }

    async fn fallback_scan(&self, name: &str, network: Ipv4Network) -> Vec<(String, String)> {
        let cached = self.read_neighbors(name).await;
        if !cached.is_empty() {
            info!("Found {} hosts in existing ARP table, skipping ping sweep", cached.len());
            return cached;
        }

        info!("ARP table empty, ping sweeping {network}...");
        let net = network.to_string();
        let fping = self
            .runner
            .output(
                "fping",
                &["-a", "-q", "-g", &net, "-r", "1", "-t", "200"],
                self.timeout + FPING_GRACE,
            )
            .await
            .unwrap_or_default();

        if fping.trim().is_empty() {
            self.ping_sweep(network).await;
        }

        let found = self.read_neighbors(name).await;
        info!("Found {} hosts via ARP table after ping sweep", found.len());
        found
    }

    async fn ping_sweep(&self, network: Ipv4Network) {
        let targets = range::host_addresses(network, PING_SWEEP_LIMIT);
        info!("fping not available, pinging {} hosts concurrently...", targets.len());

        let permits = Arc::new(Semaphore::new(PING_POOL));
        let mut set = JoinSet::new();
        for target in targets {
            let runner = Arc::clone(&self.runner);
            let permits = Arc::clone(&permits);
            set.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                let ip = target.to_string();
                // Only the neighbor cache entry the reply leaves behind matters.
                let _ = runner
                    .output("ping", &["-c", "1", "-W", "1", &ip], PING_TIMEOUT)
                    .await;
            });
        }
        while let Some(res) = set.join_next().await {
            if let Err(e) = res {
                debug!("ping task failed: {e}");
            }
        }
    }

    async fn read_neighbors(&self, name: &str) -> Vec<(String, String)> {
        let out = self
            .runner
            .output("ip", &["-4", "neigh", "show", "dev", name], NEIGH_TIMEOUT)
            .await
            .unwrap_or_default();
        iproute::parse_neighbors(&out)
    }

    /// Turns raw sweep results into categorized hosts, gateway first.
    ///
    /// The local address is dropped and repeated IPs keep their first MAC.
    /// A gateway that never answered is still listed, without a MAC.
    pub async fn identify_hosts(
        &self,
        raw: &[(String, String)],
        iface: &ResolvedInterface,
    ) -> Vec<DiscoveredHost> {
        let local_ip = iface.interface.ip.as_str();
        let gateway_ip = iface.gateway_ip.as_str();

        let mut seen = HashSet::new();
        let candidates: Vec<&(String, String)> = raw
            .iter()
            .filter(|(ip, _)| ip != local_ip && seen.insert(ip.clone()))
            .collect();
        let total = candidates.len();

        let mut hosts = Vec::with_capacity(total + 1);
        for (idx, (ip, mac)) in candidates.into_iter().enumerate() {
            let hostname = self.dns.reverse(ip).await;
            let vendor = self.vendors.get_vendor(mac).unwrap_or_default();
            let mut host = DiscoveredHost::new(ip.as_str())
                .with_mac(mac.as_str())
                .with_hostname(hostname)
                .with_vendor(vendor);
            host.is_gateway = ip == gateway_ip;

            if self.use_nmap && ip.parse::<Ipv4Addr>().is_ok() {
                let display = if host.hostname.is_empty() { ip } else { &host.hostname };
                info!("[{}/{total}] nmap scanning {display} ({ip})...", idx + 1);
                host.services = self.nmap_scan(ip).await;
            }
            hosts.push(host);
        }

        if !gateway_ip.is_empty() && !hosts.iter().any(|h| h.ip == gateway_ip) {
            let hostname = self.dns.reverse(gateway_ip).await;
            hosts.push(DiscoveredHost::new(gateway_ip).with_hostname(hostname).as_gateway());
        }

        sort_hosts(&mut hosts);
        for host in &mut hosts {
            host.category = categorize(host);
        }
        hosts
    }

    async fn nmap_scan(&self, ip: &str) -> Vec<String> {
        if !self.runner.has_program("nmap") {
            warn!("nmap not found in PATH");
            return Vec::new();
        }

        let args = nmap::service_scan_args(ip, self.top_ports);
        let argv: Vec<&str> = args.iter().map(String::as_str).collect();
        let mut services = Vec::new();
        let mut on_line = |line: &str| match nmap::classify_line(line) {
            NmapLine::Progress(status) => info!("  nmap: {status}"),
            NmapLine::Service(entry) => {
                info!("  nmap: found {entry}");
                services.push(entry);
            }
            NmapLine::Other => {}
        };

        if let Err(e) = self
            .runner
            .stream("nmap", &argv, self.timeout + NMAP_GRACE, &mut on_line)
            .await
        {
            warn!("nmap scan of {ip} incomplete: {e:#}");
        }
        services
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lanscope_common::network::host::DeviceCategory;
    use lanscope_common::network::interface::NetworkInterface;
    use lanscope_common::vendors::{NoVendors, OuiDatabase};

    use crate::network::arp::NoArpSweep;
    use crate::testing::{FakeDns, FakeRunner};

    struct CannedSweep(Vec<(String, String)>);

    #[async_trait]
    impl ArpSweep for CannedSweep {
        async fn sweep(
            &self,
            _interface: &str,
            _source: Ipv4Addr,
            _network: Ipv4Network,
            _window: Duration,
        ) -> Option<Vec<(String, String)>> {
            Some(self.0.clone())
        }
    }

    fn iface(ip: &str, prefix: u8, gateway: &str) -> ResolvedInterface {
        ResolvedInterface {
            interface: NetworkInterface {
                name: "eth0".into(),
                ip: ip.into(),
                netmask: String::new(),
                mac: String::new(),
                is_default: true,
            },
            gateway_ip: gateway.into(),
            prefix_len: prefix,
        }
    }

    fn scanner(
        runner: FakeRunner,
        arp: Arc<dyn ArpSweep>,
        config: &DiscoveryConfig,
    ) -> (Arc<FakeRunner>, HostScanner) {
        let runner = Arc::new(runner);
        let oui = OuiDatabase::parse(
            "DC-A6-32   (hex)\t\tRaspberry Pi Trading Ltd\n\
             A0-40-A0   (hex)\t\tNETGEAR\n",
        );
        let dns = FakeDns::default()
            .with("192.168.1.1", "router.fritz.box")
            .with("192.168.1.10", "nas.lan");
        let scanner = HostScanner::new(
            runner.clone(),
            arp,
            Arc::new(dns),
            Arc::new(oui),
            config,
        );
        (runner, scanner)
    }

    #[tokio::test]
    async fn arp_sweep_results_skip_the_fallback() {
        let swept = vec![("192.168.1.10".to_string(), "dc:a6:32:00:00:01".to_string())];
        let (runner, scanner) = scanner(
            FakeRunner::default(),
            Arc::new(CannedSweep(swept.clone())),
            &DiscoveryConfig::default(),
        );

        let found = scanner.scan_local_subnet(&iface("192.168.1.20", 24, "192.168.1.1")).await;
        assert_eq!(found, swept);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn populated_neighbor_cache_avoids_pinging() {
        let neigh = FakeRunner::default().with_output(
            "ip -4 neigh show dev eth0",
            "192.168.1.1 lladdr a0:40:a0:00:00:01 REACHABLE\n",
        );
        let (runner, scanner) = scanner(neigh, Arc::new(NoArpSweep), &DiscoveryConfig::default());

        let found = scanner.scan_local_subnet(&iface("192.168.1.20", 24, "192.168.1.1")).await;
        assert_eq!(found.len(), 1);
        assert!(!runner.calls().iter().any(|c| c.starts_with("fping") || c.starts_with("ping")));
    }

    #[tokio::test]
    async fn fping_output_skips_individual_pings() {
        let fake = FakeRunner::default().with_output(
            "fping -a -q -g 192.168.1.0/24 -r 1 -t 200",
            "192.168.1.1\n",
        );
        let (runner, scanner) = scanner(fake, Arc::new(NoArpSweep), &DiscoveryConfig::default());

        scanner.scan_local_subnet(&iface("192.168.1.20", 24, "192.168.1.1")).await;
        let calls = runner.calls();
        assert!(calls.iter().any(|c| c.starts_with("fping")));
        assert!(!calls.iter().any(|c| c.starts_with("ping ")));
        assert_eq!(calls.iter().filter(|c| c.starts_with("ip -4 neigh")).count(), 2);
    }

    #[tokio::test]
    async fn ping_sweep_covers_every_host_address() {
        let (runner, scanner) = scanner(
            FakeRunner::default(),
            Arc::new(NoArpSweep),
            &DiscoveryConfig::default(),
        );

        scanner.scan_local_subnet(&iface("10.1.1.1", 30, "")).await;
        let mut pings: Vec<String> = runner
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("ping "))
            .collect();
        pings.sort();
        assert_eq!(pings, vec!["ping -c 1 -W 1 10.1.1.1", "ping -c 1 -W 1 10.1.1.2"]);
    }

    #[tokio::test]
    async fn identify_enriches_sorts_and_synthesizes_gateway() {
        let (_, scanner) = scanner(
            FakeRunner::default(),
            Arc::new(NoArpSweep),
            &DiscoveryConfig::default(),
        );
        let raw = vec![
            ("192.168.1.30".to_string(), "00:11:22:33:44:55".to_string()),
            ("192.168.1.20".to_string(), "aa:aa:aa:aa:aa:aa".to_string()),
            ("192.168.1.10".to_string(), "dc:a6:32:00:00:01".to_string()),
            ("192.168.1.10".to_string(), "ff:ff:ff:ff:ff:ff".to_string()),
        ];

        let hosts = scanner
            .identify_hosts(&raw, &iface("192.168.1.20", 24, "192.168.1.1"))
            .await;
        let ips: Vec<&str> = hosts.iter().map(|h| h.ip.as_str()).collect();
        assert_eq!(ips, ["192.168.1.1", "192.168.1.10", "192.168.1.30"]);

        let gateway = &hosts[0];
        assert!(gateway.is_gateway);
        assert!(gateway.mac.is_empty());
        assert_eq!(gateway.hostname, "router.fritz.box");
        assert!(!gateway.is_infrastructure);

        let nas = &hosts[1];
        assert_eq!(nas.mac, "dc:a6:32:00:00:01");
        assert_eq!(nas.vendor, "Raspberry Pi Trading Ltd");
        assert_eq!(nas.category, DeviceCategory::Server);
        assert_eq!(hosts[2].category, DeviceCategory::Other);
        assert!(hosts.iter().all(|h| h.services.is_empty()));
    }

    #[tokio::test]
    async fn answering_gateway_is_marked_not_duplicated() {
        let runner = Arc::new(FakeRunner::default());
        let scanner = HostScanner::new(
            runner,
            Arc::new(NoArpSweep),
            Arc::new(FakeDns::default()),
            Arc::new(NoVendors),
            &DiscoveryConfig::default(),
        );
        let raw = vec![("10.0.0.1".to_string(), "a0:40:a0:00:00:01".to_string())];

        let hosts = scanner.identify_hosts(&raw, &iface("10.0.0.2", 24, "10.0.0.1")).await;
        assert_eq!(hosts.len(), 1);
        assert!(hosts[0].is_gateway);
        assert_eq!(hosts[0].mac, "a0:40:a0:00:00:01");
        assert!(hosts[0].vendor.is_empty());
    }

    #[tokio::test]
    async fn nmap_services_are_collected_from_the_stream() {
        let config = DiscoveryConfig {
            use_nmap: true,
            top_ports: 20,
            ..Default::default()
        };
        let fake = FakeRunner::default().with_output(
            "nmap -sV --top-ports 20 -T4 --open --stats-every 5s 192.168.1.10",
            "Nmap scan report for nas.lan (192.168.1.10)\n\
             PORT    STATE SERVICE VERSION\n\
             22/tcp  open  ssh     OpenSSH 9.2p1\n\
             445/tcp open  microsoft-ds\n\
             Nmap done: 1 IP address (1 host up)\n",
        );
        let (runner, scanner) = scanner(fake, Arc::new(NoArpSweep), &config);
        let raw = vec![("192.168.1.10".to_string(), "dc:a6:32:00:00:01".to_string())];

        let hosts = scanner.identify_hosts(&raw, &iface("192.168.1.20", 24, "")).await;
        assert_eq!(
            hosts[0].services,
            vec!["22/tcp ssh (OpenSSH 9.2p1)", "445/tcp microsoft-ds"]
        );
        assert_eq!(runner.calls().len(), 1);
    }
}
