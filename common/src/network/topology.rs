use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::host::DiscoveredHost;
use super::interface::NetworkInterface;
use super::trace::TraceroutePath;

/// `host_ip -> parent_ip`. Forms a forest rooted at each subnet's gateway.
pub type TopologyTree = BTreeMap<String, String>;

/// Where a switch port was learned for a host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SwitchPortMapping {
    pub switch_ip: String,
    #[serde(default)]
    pub switch_name: String,
    pub port_index: u64,
    /// Vendor-formatted name such as `U1/g5` or `LAG3`.
    #[serde(default)]
    pub port_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum L2Source {
    Snmp,
    Lldp,
    Manual,
}

impl fmt::Display for L2Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            L2Source::Snmp => "snmp",
            L2Source::Lldp => "lldp",
            L2Source::Manual => "manual",
        };
        f.write_str(s)
    }
}

/// One resolved host -> switch edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct L2TopologyEntry {
    pub host_ip: String,
    pub host_mac: String,
    pub switch: SwitchPortMapping,
    pub source: L2Source,
}

/// Everything learned about the subnet behind one local interface.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubnetScan {
    pub interface: NetworkInterface,
    #[serde(default)]
    pub gateway: Option<DiscoveredHost>,
    #[serde(default)]
    pub hosts: Vec<DiscoveredHost>,
    #[serde(default)]
    pub topology_tree: TopologyTree,
    #[serde(default)]
    pub l2_topology: Vec<L2TopologyEntry>,
}

/// The artifact handed to renderers.
///
/// The single-subnet fields (`local_interface`, `gateway`) hold the first
/// successfully scanned interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkTopology {
    pub local_interface: NetworkInterface,
    #[serde(default)]
    pub subnets: Vec<SubnetScan>,
    #[serde(default)]
    pub gateway: Option<DiscoveredHost>,
    #[serde(default)]
    pub local_hosts: Vec<DiscoveredHost>,
    #[serde(default)]
    pub traceroute_paths: Vec<TraceroutePath>,
    #[serde(default)]
    pub topology_tree: TopologyTree,
    #[serde(default)]
    pub l2_topology: Vec<L2TopologyEntry>,
    pub timestamp: DateTime<Utc>,
}

/// Replaces entries in `base` with `overrides` for every host IP the
/// override source supplies; other hosts keep their existing entry.
pub fn override_entries(
    base: Vec<L2TopologyEntry>,
    overrides: Vec<L2TopologyEntry>,
) -> Vec<L2TopologyEntry> {
    let replaced: std::collections::HashSet<&str> =
        overrides.iter().map(|e| e.host_ip.as_str()).collect();
    let mut merged: Vec<L2TopologyEntry> = base
        .into_iter()
        .filter(|e| !replaced.contains(e.host_ip.as_str()))
        .collect();
    merged.extend(overrides);
    merged
}

/// Whether adding `child -> parent` would close a cycle, i.e. `child` is
/// `parent` or one of its ancestors.
pub fn creates_loop(tree: &TopologyTree, child: &str, parent: &str) -> bool {
    let mut current = parent;
    for _ in 0..=tree.len() {
        if current == child {
            return true;
        }
        match tree.get(current) {
            Some(next) => current = next.as_str(),
            None => return false,
        }
    }
    true
}
