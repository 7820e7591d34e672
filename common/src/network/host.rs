use std::cmp::Ordering;
use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Hostname suffixes stripped before comparing or labelling hosts.
const HOSTNAME_SUFFIXES: &[&str] = &[".fritz.box", ".local", ".lan"];

/// Coarse device classes, serialized as their display labels.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceCategory {
    #[serde(rename = "Infrastructure")]
    Infrastructure,
    #[serde(rename = "Servers")]
    Server,
    #[serde(rename = "IoT / Smart")]
    Iot,
    #[serde(rename = "Phones / VoIP")]
    Phone,
    #[serde(rename = "Media")]
    Media,
    #[serde(rename = "Home Automation")]
    HomeAutomation,
    #[serde(rename = "Computers / Printers")]
    Computer,
    #[default]
    #[serde(rename = "Other")]
    Other,
}

impl DeviceCategory {
    pub fn label(&self) -> &'static str {
        match self {
            DeviceCategory::Infrastructure => "Infrastructure",
            DeviceCategory::Server => "Servers",
            DeviceCategory::Iot => "IoT / Smart",
            DeviceCategory::Phone => "Phones / VoIP",
            DeviceCategory::Media => "Media",
            DeviceCategory::HomeAutomation => "Home Automation",
            DeviceCategory::Computer => "Computers / Printers",
            DeviceCategory::Other => "Other",
        }
    }
}

impl fmt::Display for DeviceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A host seen on a scanned subnet.
///
/// `ip` and `mac` are fixed at creation. `is_infrastructure` is only ever
/// set by the topology merge, never by the scanner.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredHost {
    pub ip: String,
    #[serde(default)]
    pub mac: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub is_gateway: bool,
    #[serde(default)]
    pub is_infrastructure: bool,
    #[serde(default)]
    pub category: DeviceCategory,
}

impl DiscoveredHost {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            ..Default::default()
        }
    }

    pub fn with_mac(mut self, mac: impl Into<String>) -> Self {
        self.mac = mac.into();
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }

    pub fn as_gateway(mut self) -> Self {
        self.is_gateway = true;
        self
    }

    /// Hostname with common LAN suffixes removed, lowercased.
    pub fn normalized_hostname(&self) -> String {
        strip_hostname_suffix(&self.hostname).to_lowercase()
    }
}

/// Strips the first matching LAN DNS suffix (case-insensitive).
pub fn strip_hostname_suffix(hostname: &str) -> &str {
    let lower = hostname.to_ascii_lowercase();
    for suffix in HOSTNAME_SUFFIXES {
        if lower.ends_with(suffix) {
            return &hostname[..hostname.len() - suffix.len()];
        }
    }
    hostname
}

/// Gateway first, then ascending numeric IPv4. Unparseable addresses sort last.
pub fn sort_hosts(hosts: &mut [DiscoveredHost]) {
    hosts.sort_by(|a, b| match (a.is_gateway, b.is_gateway) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => ip_sort_key(&a.ip).cmp(&ip_sort_key(&b.ip)),
    });
}

fn ip_sort_key(ip: &str) -> (bool, u32) {
    match ip.parse::<Ipv4Addr>() {
        Ok(addr) => (false, u32::from(addr)),
        Err(_) => (true, u32::MAX),
    }
}
