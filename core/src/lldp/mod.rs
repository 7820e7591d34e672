//! LLDP neighbor collection over SSH and the host -> switch edges it yields.
//!
//! Collection and parsing are separate steps joined by a directory of
//! `<host_ip>.json` files, so a collected directory can be parsed again
//! later without touching the network.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use lanscope_common::error::RemoteExecError;
use lanscope_common::network::host::{DiscoveredHost, strip_hostname_suffix};
use lanscope_common::network::topology::{L2Source, L2TopologyEntry, SwitchPortMapping, TopologyTree};
use lanscope_protocols::lldp::{self, LLDPCTL_COMMAND, LldpNeighbor};

pub mod ssh;

const COLLECT_POOL: usize = 20;

/// Runs one non-interactive command on a remote host.
#[async_trait]
pub trait RemoteExec: Send + Sync {
    async fn run(&self, host: &str, command: &str) -> Result<String, RemoteExecError>;
}

pub struct LldpCollector {
    exec: Arc<dyn RemoteExec>,
}

impl LldpCollector {
    pub fn new(exec: Arc<dyn RemoteExec>) -> Self {
        Self { exec }
    }

    /// Queries every non-gateway host and writes each valid payload to
    /// `<output_dir>/<ip>.json`. Returns how many files were written.
    pub async fn collect(&self, hosts: &[DiscoveredHost], output_dir: &Path) -> usize {
        let targets: Vec<String> = hosts
            .iter()
            .filter(|h| !h.ip.is_empty() && !h.is_gateway)
            .map(|h| h.ip.clone())
            .collect();
        if targets.is_empty() {
            return 0;
        }
        let total = targets.len();
        info!("LLDP collect: querying {total} hosts via SSH...");

        let permits = Arc::new(Semaphore::new(COLLECT_POOL));
        let mut set = JoinSet::new();
        for ip in targets {
            let exec = Arc::clone(&self.exec);
            let permits = Arc::clone(&permits);
            set.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return (ip, None);
                };
                let payload = match exec.run(&ip, LLDPCTL_COMMAND).await {
                    Ok(raw) if lldp::is_valid_payload(&raw) => Some(raw),
                    Ok(_) => {
                        debug!("{ip}: lldpctl returned no usable JSON");
                        None
                    }
                    Err(e) => {
                        debug!("{ip}: {e}");
                        None
                    }
                };
                (ip, payload)
            });
        }

        let mut done = 0;
        let mut written = 0;
        while let Some(joined) = set.join_next().await {
            done += 1;
            let (ip, payload) = match joined {
                Ok(result) => result,
                Err(e) => {
                    debug!("  [{done}/{total}] LLDP task failed: {e}");
                    continue;
                }
            };
            let Some(raw) = payload else {
                debug!("  [{done}/{total}] {ip}: no LLDP data");
                continue;
            };
            let out_file = output_dir.join(format!("{ip}.json"));
            match tokio::fs::write(&out_file, raw).await {
                Ok(()) => {
                    written += 1;
                    info!("  [{done}/{total}] {ip}: written to {}", out_file.display());
                }
                Err(e) => warn!("  [{done}/{total}] {ip}: cannot write {}: {e}", out_file.display()),
            }
        }

        info!(
            "LLDP collect: {written}/{total} hosts written to {}",
            output_dir.display()
        );
        written
    }
}

/// Reads every `<ip>.json` in `dir` that belongs to a known host and turns
/// its neighbors into entries. Neighbors that match no known host keep an
/// empty switch IP.
pub fn load_and_parse(dir: &Path, hosts: &[DiscoveredHost]) -> Vec<L2TopologyEntry> {
    let index = HostIndex::new(hosts);

    let files = match json_files(dir) {
        Ok(files) => files,
        Err(e) => {
            warn!("LLDP: cannot read {}: {e}", dir.display());
            return Vec::new();
        }
    };
    if files.is_empty() {
        warn!("LLDP: no JSON files found in {}", dir.display());
        return Vec::new();
    }

    let mut entries = Vec::new();
    for file in &files {
        let Some(host_ip) = file.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some(host) = index.by_ip.get(host_ip) else {
            debug!("LLDP: {}: host {host_ip} not in discovered hosts, skipping", file.display());
            continue;
        };
        let data = match std::fs::read_to_string(file)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str::<serde_json::Value>(&text).map_err(|e| e.to_string()))
        {
            Ok(data) => data,
            Err(e) => {
                debug!("LLDP: {}: failed to read: {e}", file.display());
                continue;
            }
        };

        entries.extend(
            lldp::parse_neighbors(&data)
                .into_iter()
                .map(|neighbor| index.entry_for(host, neighbor)),
        );
    }

    info!(
        "LLDP: parsed {} entries from {} files in {}",
        entries.len(),
        files.len(),
        dir.display()
    );
    entries
}

/// Keeps the entries and maps each matched host to its switch.
pub fn build_l2_from_lldp(entries: Vec<L2TopologyEntry>) -> (Vec<L2TopologyEntry>, TopologyTree) {
    let tree = entries
        .iter()
        .filter(|e| !e.switch.switch_ip.is_empty() && e.switch.switch_ip != e.host_ip)
        .map(|e| (e.host_ip.clone(), e.switch.switch_ip.clone()))
        .collect();
    (entries, tree)
}

fn json_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

struct HostIndex<'a> {
    by_ip: HashMap<&'a str, &'a DiscoveredHost>,
    by_mac: HashMap<String, &'a DiscoveredHost>,
    by_name: HashMap<String, &'a DiscoveredHost>,
}

impl<'a> HostIndex<'a> {
    fn new(hosts: &'a [DiscoveredHost]) -> Self {
        let mut index = Self {
            by_ip: HashMap::new(),
            by_mac: HashMap::new(),
            by_name: HashMap::new(),
        };
        for host in hosts {
            if !host.ip.is_empty() {
                index.by_ip.insert(host.ip.as_str(), host);
            }
            if !host.mac.is_empty() {
                index.by_mac.insert(host.mac.to_lowercase(), host);
            }
            if !host.hostname.is_empty() {
                index.by_name.insert(host.normalized_hostname(), host);
            }
        }
        index
    }

    /// MAC first, then the suffix-stripped chassis name.
    fn switch_ip_for(&self, neighbor: &LldpNeighbor) -> String {
        if !neighbor.chassis_mac.is_empty()
            && let Some(host) = self.by_mac.get(&neighbor.chassis_mac)
        {
            return host.ip.clone();
        }
        if !neighbor.chassis_name.is_empty() {
            let name = strip_hostname_suffix(&neighbor.chassis_name).to_lowercase();
            if let Some(host) = self.by_name.get(&name) {
                return host.ip.clone();
            }
        }
        String::new()
    }

    fn entry_for(&self, host: &DiscoveredHost, neighbor: LldpNeighbor) -> L2TopologyEntry {
        let switch_ip = self.switch_ip_for(&neighbor);
        L2TopologyEntry {
            host_ip: host.ip.clone(),
            host_mac: host.mac.clone(),
            switch: SwitchPortMapping {
                switch_ip,
                switch_name: neighbor.chassis_name,
                port_index: 0,
                port_name: neighbor.port_name,
            },
            source: L2Source::Lldp,
        }
    }
}
