use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Snapshot of one local NIC at resolution time.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub name: String,
    pub ip: String,
    pub netmask: String,
    #[serde(default)]
    pub mac: String,
    #[serde(default)]
    pub is_default: bool,
}

impl NetworkInterface {
    /// Prefix length derived from the dotted netmask, if it is a valid one.
    pub fn prefix_len(&self) -> Option<u8> {
        let mask: Ipv4Addr = self.netmask.parse().ok()?;
        netmask_to_prefix(mask)
    }
}

/// Interface names are passed to `ip(8)`, so only `[a-zA-Z0-9._-]+` is accepted.
pub fn is_valid_interface_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

pub fn prefix_to_netmask(prefix: u8) -> Ipv4Addr {
    let bits: u32 = match prefix {
        0 => 0,
        p if p >= 32 => u32::MAX,
        p => u32::MAX << (32 - p),
    };
    Ipv4Addr::from(bits)
}

/// Returns `None` for non-contiguous masks.
pub fn netmask_to_prefix(mask: Ipv4Addr) -> Option<u8> {
    let bits = u32::from(mask);
    let ones = bits.leading_ones();
    if bits.checked_shl(ones).unwrap_or(0) != 0 {
        return None;
    }
    Some(ones as u8)
}
