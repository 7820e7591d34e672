use std::net::Ipv4Addr;
use std::path::PathBuf;

use tracing::warn;

use crate::error::InputError;

pub const DEFAULT_COMMUNITY: &str = "public";
pub const DEFAULT_TOP_PORTS: u32 = 100;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_HOPS: u32 = 30;
pub const DEFAULT_OUI_CACHE: &str = "/tmp/oui.txt";
pub const DEFAULT_SSH_USER: &str = "root";

/// A switch to query over SNMP v2c.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchTarget {
    pub ip: String,
    pub community: String,
}

/// A host -> switch port link supplied by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualLink {
    pub host_ip: String,
    pub switch_ip: String,
    pub port_name: String,
}

/// Every option of one discovery run.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Interfaces to scan. Empty means "the default-route interface".
    pub interfaces: Vec<String>,
    pub use_nmap: bool,
    pub top_ports: u32,
    /// Per-call timeout in seconds for the scanners and traces.
    pub timeout: u64,
    pub max_hops: u32,
    pub trace_local: bool,
    pub switches: Vec<SwitchTarget>,
    pub lldp_collect_dir: Option<PathBuf>,
    pub lldp_dir: Option<PathBuf>,
    pub manual_topology: Vec<ManualLink>,
    pub traceroute_targets: Vec<String>,
    pub oui_cache_path: PathBuf,
    pub ssh_user: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            interfaces: Vec::new(),
            use_nmap: false,
            top_ports: DEFAULT_TOP_PORTS,
            timeout: DEFAULT_TIMEOUT_SECS,
            max_hops: DEFAULT_MAX_HOPS,
            trace_local: false,
            switches: Vec::new(),
            lldp_collect_dir: None,
            lldp_dir: None,
            manual_topology: Vec::new(),
            traceroute_targets: Vec::new(),
            oui_cache_path: PathBuf::from(DEFAULT_OUI_CACHE),
            ssh_user: DEFAULT_SSH_USER.to_string(),
        }
    }
}

impl DiscoveryConfig {
    /// Directory LLDP JSON is read back from: an explicit read directory
    /// wins over the collection directory.
    pub fn lldp_read_dir(&self) -> Option<&PathBuf> {
        self.lldp_dir.as_ref().or(self.lldp_collect_dir.as_ref())
    }
}

/// Parses `IP[:COMMUNITY],...`. Malformed entries are skipped with a warning.
pub fn parse_switches(s: &str) -> Vec<SwitchTarget> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| match parse_switch(part) {
            Ok(target) => Some(target),
            Err(e) => {
                warn!("Skipping switch entry: {e}");
                None
            }
        })
        .collect()
}

fn parse_switch(part: &str) -> Result<SwitchTarget, InputError> {
    let (ip, community) = match part.split_once(':') {
        Some((ip, community)) if !community.trim().is_empty() => (ip.trim(), community.trim()),
        Some((ip, _)) => (ip.trim(), DEFAULT_COMMUNITY),
        None => (part, DEFAULT_COMMUNITY),
    };
    validate_ip(ip)?;
    Ok(SwitchTarget {
        ip: ip.to_string(),
        community: community.to_string(),
    })
}

/// Parses `HOST_IP:SWITCH_IP:PORT_NAME,...`. The port name keeps any further
/// colons. Malformed entries are skipped with a warning.
pub fn parse_topology(s: &str) -> Vec<ManualLink> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| match parse_link(part) {
            Ok(link) => Some(link),
            Err(e) => {
                warn!("Skipping topology entry: {e}");
                None
            }
        })
        .collect()
}

fn parse_link(part: &str) -> Result<ManualLink, InputError> {
    let mut fields = part.splitn(3, ':').map(str::trim);
    let (Some(host_ip), Some(switch_ip), Some(port_name)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(InputError::Malformed {
            entry: part.to_string(),
            expected: "HOST_IP:SWITCH_IP:PORT_NAME",
        });
    };
    if port_name.is_empty() {
        return Err(InputError::Malformed {
            entry: part.to_string(),
            expected: "HOST_IP:SWITCH_IP:PORT_NAME",
        });
    }
    validate_ip(host_ip)?;
    validate_ip(switch_ip)?;
    Ok(ManualLink {
        host_ip: host_ip.to_string(),
        switch_ip: switch_ip.to_string(),
        port_name: port_name.to_string(),
    })
}

fn validate_ip(ip: &str) -> Result<(), InputError> {
    ip.parse::<Ipv4Addr>()
        .map(|_| ())
        .map_err(|_| InputError::InvalidIp(ip.to_string()))
}
