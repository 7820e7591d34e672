//! # Topology Discovery
//!
//! Runs the whole pipeline for every requested interface and folds the
//! results into one [`NetworkTopology`].
//!
//! Layer-2 sources are applied per subnet in a fixed order, each one
//! replacing earlier edges only for the hosts it actually knows about:
//!
//! 1. SNMP bridge tables (`switches`)
//! 2. LLDP neighbor files (`lldp_collect_dir` / `lldp_dir`)
//! 3. Operator-supplied links (`manual_topology`)
//!
//! Hosts left without a parent fall back to the gateway. Route tracing is
//! only used to build the tree when none of those sources produced anything.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing::{debug, info, warn};

use lanscope_common::config::{DiscoveryConfig, ManualLink};
use lanscope_common::error::DiscoveryError;
use lanscope_common::network::host::DiscoveredHost;
use lanscope_common::network::topology::{
    L2Source, L2TopologyEntry, NetworkTopology, SubnetScan, SwitchPortMapping, TopologyTree,
    creates_loop, override_entries,
};
use lanscope_common::vendors::VendorRepository;

use crate::dns::{ReverseDns, SystemDns};
use crate::interface::{InterfaceResolver, ResolvedInterface};
use crate::lldp::ssh::SshExec;
use crate::lldp::{self, LldpCollector, RemoteExec};
use crate::network::arp::{ArpSweep, PnetArpSweep};
use crate::scanner::HostScanner;
use crate::snmp::client::Snmp2Connector;
use crate::snmp::{self, MacTable, SnmpBridgeDiscoverer, SnmpConnector};
use crate::system::{CommandRunner, SystemRunner};
use crate::trace::{self, TraceProbe};
use crate::vendors::load_vendor_repository;

/// Everything the pipeline needs from the outside world.
#[derive(Clone)]
pub struct Capabilities {
    pub runner: Arc<dyn CommandRunner>,
    pub arp: Arc<dyn ArpSweep>,
    pub dns: Arc<dyn ReverseDns>,
    pub vendors: Arc<dyn VendorRepository>,
    pub snmp: Arc<dyn SnmpConnector>,
    pub remote: Arc<dyn RemoteExec>,
}

impl Capabilities {
    /// Real processes, sockets and resolvers for this host.
    pub async fn system(config: &DiscoveryConfig) -> Self {
        Self {
            runner: Arc::new(SystemRunner),
            arp: Arc::new(PnetArpSweep),
            dns: Arc::new(SystemDns),
            vendors: load_vendor_repository(&config.oui_cache_path).await,
            snmp: Arc::new(Snmp2Connector::default()),
            remote: Arc::new(SshExec::new(config.ssh_user.clone())),
        }
    }
}

pub struct Discovery {
    config: DiscoveryConfig,
    resolver: InterfaceResolver,
    scanner: HostScanner,
    bridges: SnmpBridgeDiscoverer,
    lldp: LldpCollector,
    probe: TraceProbe,
}

impl Discovery {
    pub fn new(config: DiscoveryConfig, caps: Capabilities) -> Self {
        let scanner = HostScanner::new(
            Arc::clone(&caps.runner),
            caps.arp,
            Arc::clone(&caps.dns),
            caps.vendors,
            &config,
        );
        Self {
            resolver: InterfaceResolver::new(Arc::clone(&caps.runner)),
            scanner,
            bridges: SnmpBridgeDiscoverer::new(caps.snmp),
            lldp: LldpCollector::new(caps.remote),
            probe: TraceProbe::new(caps.runner, caps.dns, config.max_hops),
            config,
        }
    }

    pub async fn run(&self) -> anyhow::Result<NetworkTopology> {
        info!("Starting network topology discovery...");

        let requested: Vec<Option<&str>> = if self.config.interfaces.is_empty() {
            vec![None]
        } else {
            self.config.interfaces.iter().map(|name| Some(name.as_str())).collect()
        };

        let switch_ips: HashSet<String> = self.config.switches.iter().map(|s| s.ip.clone()).collect();
        let mac_table = if self.config.switches.is_empty() {
            None
        } else {
            let table = self.bridges.discover(&self.config.switches).await;
            info!(
                "SNMP: {} unique MACs from {} switch(es)",
                table.len(),
                self.config.switches.len()
            );
            Some(table)
        };

        let mut subnets: Vec<SubnetScan> = Vec::new();
        for name in requested {
            let iface = self.resolver.resolve(name).await?;
            info!(
                "Interface: {} ({}/{})",
                iface.interface.name, iface.interface.ip, iface.interface.netmask
            );
            if !iface.has_ipv4() {
                warn!("Skipping {}: no IPv4 address assigned", iface.interface.name);
                continue;
            }
            subnets.push(self.scan_subnet(&iface, mac_table.as_ref(), &switch_ips).await?);
        }

        let Some(primary) = subnets.first() else {
            return Err(DiscoveryError::NoUsableSubnet.into());
        };
        let local_interface = primary.interface.clone();
        let gateway = subnets.iter().find_map(|s| s.gateway.clone());

        let mut local_hosts = Vec::new();
        let mut topology_tree = TopologyTree::new();
        let mut l2_topology = Vec::new();
        for subnet in &subnets {
            local_hosts.extend(subnet.hosts.iter().cloned());
            topology_tree.extend(subnet.topology_tree.clone());
            l2_topology.extend(subnet.l2_topology.iter().cloned());
        }

        let traceroute_paths = if self.config.traceroute_targets.is_empty() {
            Vec::new()
        } else {
            self.probe.traceroute_targets(&self.config.traceroute_targets).await
        };

        Ok(NetworkTopology {
            local_interface,
            subnets,
            gateway,
            local_hosts,
            traceroute_paths,
            topology_tree,
            l2_topology,
            timestamp: Utc::now(),
        })
    }

    async fn scan_subnet(
        &self,
        iface: &ResolvedInterface,
        mac_table: Option<&MacTable>,
        switch_ips: &HashSet<String>,
    ) -> anyhow::Result<SubnetScan> {
        let name = iface.interface.name.as_str();
        let raw = self.scanner.scan_local_subnet(iface).await;
        let mut hosts = self.scanner.identify_hosts(&raw, iface).await;
        info!("Identified {} hosts on {name}", hosts.len());

        let gateway_ip = hosts.iter().find(|h| h.is_gateway).map(|h| h.ip.clone());
        let mut l2 = SubnetL2::default();

        if let Some(table) = mac_table {
            l2.apply_snmp(&mut hosts, table, switch_ips);
            info!(
                "L2 topology SNMP ({name}): {} entries, {} infrastructure nodes",
                l2.entries.len(),
                infrastructure_count(&hosts)
            );
        }

        if let Some(dir) = &self.config.lldp_collect_dir {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating LLDP directory {}", dir.display()))?;
            self.lldp.collect(&hosts, dir).await;
        }
        if let Some(dir) = self.config.lldp_read_dir() {
            let found = lldp::load_and_parse(dir, &hosts);
            if !found.is_empty() {
                let merged = l2.apply_lldp(&mut hosts, found);
                info!("L2 topology LLDP ({name}): {merged} entries merged");
            }
        }

        if !self.config.manual_topology.is_empty() {
            let merged = l2.apply_manual(&mut hosts, &self.config.manual_topology);
            if merged > 0 {
                info!("L2 topology manual ({name}): {merged} entries merged");
            }
        }

        if let Some(gateway_ip) = &gateway_ip {
            if l2.has_data {
                l2.default_to_gateway(&hosts, gateway_ip, &iface.interface.ip);
            } else if self.config.trace_local {
                let paths = self.probe.trace_local_hosts(&hosts, &iface.interface.ip).await;
                l2.tree = trace::build_topology_tree(&mut hosts, &paths, gateway_ip);
                info!(
                    "Topology tree ({name}): {} entries, {} infrastructure nodes",
                    l2.tree.len(),
                    infrastructure_count(&hosts)
                );
            }
        }

        let gateway = hosts.iter().find(|h| h.is_gateway).cloned();
        Ok(SubnetScan {
            interface: iface.interface.clone(),
            gateway,
            hosts,
            topology_tree: l2.tree,
            l2_topology: l2.entries,
        })
    }
}

/// Resolves capabilities for this machine and runs one discovery.
pub async fn run_discovery(config: DiscoveryConfig) -> anyhow::Result<NetworkTopology> {
    let caps = Capabilities::system(&config).await;
    Discovery::new(config, caps).run().await
}

fn infrastructure_count(hosts: &[DiscoveredHost]) -> usize {
    hosts.iter().filter(|h| h.is_infrastructure).count()
}

/// The gateway is never flagged, even when it also forwards for others.
fn mark_infrastructure(hosts: &mut [DiscoveredHost], ip: &str) {
    for host in hosts.iter_mut().filter(|h| h.ip == ip && !h.is_gateway) {
        host.is_infrastructure = true;
    }
}

/// Edges and parent map built up for one subnet, source by source.
#[derive(Debug, Default)]
struct SubnetL2 {
    entries: Vec<L2TopologyEntry>,
    tree: TopologyTree,
    has_data: bool,
}

impl SubnetL2 {
    fn apply_snmp(&mut self, hosts: &mut [DiscoveredHost], table: &MacTable, switch_ips: &HashSet<String>) {
        let (entries, tree) = snmp::build_l2_topology(hosts, table, switch_ips);
        for ip in switch_ips {
            mark_infrastructure(hosts, ip);
        }
        self.has_data |= !entries.is_empty();
        self.entries = entries;
        self.tree = tree;
    }

    /// Neighbors that matched no known host are dropped. Returns how many
    /// entries were merged.
    fn apply_lldp(&mut self, hosts: &mut [DiscoveredHost], found: Vec<L2TopologyEntry>) -> usize {
        let matched: Vec<L2TopologyEntry> = found
            .into_iter()
            .filter(|e| !e.switch.switch_ip.is_empty())
            .collect();
        let (entries, tree) = lldp::build_l2_from_lldp(matched);
        self.merge(hosts, entries, tree)
    }

    /// Links for hosts outside this subnet are ignored. Returns how many
    /// links were applied.
    fn apply_manual(&mut self, hosts: &mut [DiscoveredHost], links: &[ManualLink]) -> usize {
        let mut entries = Vec::new();
        let mut tree = TopologyTree::new();
        for link in links {
            let Some(host) = hosts.iter().find(|h| h.ip == link.host_ip) else {
                continue;
            };
            entries.push(L2TopologyEntry {
                host_ip: link.host_ip.clone(),
                host_mac: host.mac.clone(),
                switch: SwitchPortMapping {
                    switch_ip: link.switch_ip.clone(),
                    switch_name: String::new(),
                    port_index: 0,
                    port_name: link.port_name.clone(),
                },
                source: L2Source::Manual,
            });
            tree.insert(link.host_ip.clone(), link.switch_ip.clone());
        }
        self.merge(hosts, entries, tree)
    }

    /// Overrides the current parent of every host `tree` supplies. Edges that
    /// would give the gateway a parent or close a cycle are skipped along
    /// with their entries. Returns how many entries were merged.
    fn merge(&mut self, hosts: &mut [DiscoveredHost], entries: Vec<L2TopologyEntry>, tree: TopologyTree) -> usize {
        let mut accepted = TopologyTree::new();
        for (child, parent) in tree {
            if hosts.iter().any(|h| h.ip == child && h.is_gateway) {
                debug!("Ignoring parent {parent} for gateway {child}");
                continue;
            }
            if creates_loop(&self.tree, &child, &parent) {
                debug!("Ignoring {child} -> {parent}: would close a loop");
                continue;
            }
            self.tree.insert(child.clone(), parent.clone());
            accepted.insert(child, parent);
        }

        let entries: Vec<L2TopologyEntry> = entries
            .into_iter()
            .filter(|e| accepted.get(&e.host_ip) == Some(&e.switch.switch_ip))
            .collect();
        let merged = entries.len();
        if merged == 0 {
            return 0;
        }
        for switch_ip in accepted.values() {
            mark_infrastructure(hosts, switch_ip);
        }
        self.entries = override_entries(std::mem::take(&mut self.entries), entries);
        self.has_data = true;
        merged
    }

    fn default_to_gateway(&mut self, hosts: &[DiscoveredHost], gateway_ip: &str, local_ip: &str) {
        for host in hosts {
            if !host.is_gateway && host.ip != local_ip && !self.tree.contains_key(&host.ip) {
                self.tree.insert(host.ip.clone(), gateway_ip.to_string());
            }
        }
    }
}
