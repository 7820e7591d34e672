pub mod discover;

use std::path::PathBuf;

use clap::Parser;
use lanscope_common::config::{
    DEFAULT_MAX_HOPS, DEFAULT_OUI_CACHE, DEFAULT_SSH_USER, DEFAULT_TIMEOUT_SECS, DEFAULT_TOP_PORTS,
    DiscoveryConfig, parse_switches, parse_topology,
};
use lanscope_common::network::target::expand_targets;

#[derive(Parser, Debug)]
#[command(name = "lanscope")]
#[command(about = "LAN topology discovery: hosts, switch ports and routes as JSON.")]
#[command(version)]
pub struct CommandLine {
    /// Network interface(s) to scan, comma-separated (default: default-route interface)
    #[arg(short, long = "interface", value_delimiter = ',')]
    pub interfaces: Vec<String>,

    /// Traceroute targets: IPs, hostnames, CIDR (192.168.1.0/24) or ranges (192.168.1.1-254)
    #[arg(short, long)]
    pub targets: Option<String>,

    /// Enable nmap service detection
    #[arg(long)]
    pub nmap: bool,

    /// nmap top ports to scan
    #[arg(long, default_value_t = DEFAULT_TOP_PORTS)]
    pub top_ports: u32,

    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Scan timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Max traceroute hops
    #[arg(long, default_value_t = DEFAULT_MAX_HOPS)]
    pub max_hops: u32,

    /// Trace every discovered LAN host to infer the switch hierarchy
    #[arg(long)]
    pub trace_local: bool,

    /// SNMP switches as IP[:COMMUNITY],... (community defaults to public)
    #[arg(long)]
    pub switches: Option<String>,

    /// SSH into discovered hosts, run lldpctl and write DIR/<ip>.json
    #[arg(long = "lldp-collect", value_name = "DIR")]
    pub lldp_collect: Option<PathBuf>,

    /// Read LLDP data from DIR/<ip>.json without SSH
    #[arg(long, value_name = "DIR")]
    pub lldp_dir: Option<PathBuf>,

    /// Manual L2 links as HOST_IP:SWITCH_IP:PORT_NAME,...
    #[arg(long)]
    pub topology: Option<String>,

    /// User for LLDP collection over SSH
    #[arg(long, default_value = DEFAULT_SSH_USER)]
    pub ssh_user: String,

    /// Where the IEEE OUI listing is cached
    #[arg(long, default_value = DEFAULT_OUI_CACHE)]
    pub oui_cache: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Malformed `--targets`, `--switches` and `--topology` entries are
    /// dropped with a warning.
    pub fn to_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            interfaces: self
                .interfaces
                .iter()
                .map(|i| i.trim().to_string())
                .filter(|i| !i.is_empty())
                .collect(),
            use_nmap: self.nmap,
            top_ports: self.top_ports,
            timeout: self.timeout,
            max_hops: self.max_hops,
            trace_local: self.trace_local,
            switches: self.switches.as_deref().map(parse_switches).unwrap_or_default(),
            lldp_collect_dir: self.lldp_collect.clone(),
            lldp_dir: self.lldp_dir.clone(),
            manual_topology: self.topology.as_deref().map(parse_topology).unwrap_or_default(),
            traceroute_targets: self.targets.as_deref().map(expand_targets).unwrap_or_default(),
            oui_cache_path: self.oui_cache.clone(),
            ssh_user: self.ssh_user.clone(),
        }
    }
}
