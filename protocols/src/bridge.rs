//! Interpretation of walked BRIDGE-MIB / Q-BRIDGE-MIB tables.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use lanscope_common::network::mac::mac_from_octets;
use lanscope_common::network::topology::SwitchPortMapping;

use crate::snmp::{
    OID_DOT1D_BASE_PORT_IF_INDEX, OID_DOT1D_TP_FDB_PORT, OID_DOT1Q_TP_FDB_PORT,
    OID_DOT1Q_VLAN_CURRENT_EGRESS_PORTS, OID_IF_DESCR, WalkRow, index_of,
};

/// Netgear style `unit 1 port 5 Gigabit - Level` / `Slot: 0 Port: 3 Gigabit - Level`.
static UNIT_PORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:unit|Slot:)\s*(\d+)\s+(?:port|Port:)\s*(\d+)\s+(.*)")
        .expect("invalid regex")
});

/// Friendly name for one `ifDescr` value.
pub fn format_port_name(descr: &str) -> String {
    if let Some(caps) = UNIT_PORT.captures(descr)
        && let (Ok(unit), Ok(port)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>())
    {
        let speed = if caps[3].contains("10G") { 'x' } else { 'g' };
        return format!("U{unit}/{speed}{port}");
    }

    let trimmed = descr.trim();
    if trimmed.starts_with("lag ")
        && let Some(Ok(lag)) = trimmed.split_whitespace().nth(1).map(str::parse::<u32>)
    {
        return format!("LAG{lag}");
    }
    trimmed.to_string()
}

/// `ifIndex -> friendly name` from an ifDescr walk.
pub fn port_name_map(if_descr: &[WalkRow]) -> HashMap<u64, String> {
    if_descr
        .iter()
        .filter_map(|(oid, value)| {
            let index = single_index(oid, OID_IF_DESCR)?;
            Some((index, format_port_name(&value.as_text()?)))
        })
        .collect()
}

/// `bridge port -> ifIndex` from a dot1dBasePortIfIndex walk.
pub fn bridge_port_map(rows: &[WalkRow]) -> HashMap<u64, u64> {
    rows.iter()
        .filter_map(|(oid, value)| {
            Some((single_index(oid, OID_DOT1D_BASE_PORT_IF_INDEX)?, value.as_u64()?))
        })
        .collect()
}

fn single_index(oid: &[u64], base: &[u64]) -> Option<u64> {
    match index_of(oid, base)? {
        [index] => Some(*index),
        _ => None,
    }
}

/// Every table walked from one switch.
#[derive(Debug, Default, Clone)]
pub struct BridgeTables {
    pub sys_name: String,
    pub if_descr: Vec<WalkRow>,
    pub base_port_if_index: Vec<WalkRow>,
    pub q_fdb_port: Vec<WalkRow>,
    pub fdb_port: Vec<WalkRow>,
}

impl BridgeTables {
    /// `(mac, mapping)` pairs for one switch, first-seen per MAC.
    ///
    /// Uses the VLAN-aware table when it has rows, otherwise the plain one.
    /// Bridge port 0 (the switch itself) is skipped, malformed rows are dropped.
    pub fn mac_mappings(&self, switch_ip: &str) -> Vec<(String, SwitchPortMapping)> {
        let port_names = port_name_map(&self.if_descr);
        let bp_to_if = bridge_port_map(&self.base_port_if_index);

        let (rows, base, mac_offset) = if self.q_fdb_port.is_empty() {
            (&self.fdb_port, OID_DOT1D_TP_FDB_PORT, 0)
        } else {
            (&self.q_fdb_port, OID_DOT1Q_TP_FDB_PORT, 1)
        };

        let mut seen: HashSet<String> = HashSet::new();
        let mut mappings = Vec::new();

        for (oid, value) in rows {
            let Some(index) = index_of(oid, base) else {
                continue;
            };
            if index.len() != mac_offset + 6 {
                debug!("{switch_ip}: skipping forwarding row with {}-part index", index.len());
                continue;
            }
            let Some(mac) = mac_from_octets(&index[mac_offset..]) else {
                continue;
            };
            let Some(bridge_port) = value.as_u64() else {
                continue;
            };
            if bridge_port == 0 || !seen.insert(mac.clone()) {
                continue;
            }

            let if_index = bp_to_if.get(&bridge_port).copied().unwrap_or(bridge_port);
            let port_name = port_names
                .get(&if_index)
                .cloned()
                .unwrap_or_else(|| format!("port{if_index}"));
            mappings.push((
                mac,
                SwitchPortMapping {
                    switch_ip: switch_ip.to_string(),
                    switch_name: self.sys_name.clone(),
                    port_index: if_index,
                    port_name,
                },
            ));
        }

        mappings
    }

    pub fn uses_q_bridge(&self) -> bool {
        !self.q_fdb_port.is_empty()
    }
}

/// Decodes a Q-BRIDGE `PortList` bitmap (MSB of the first octet is port 1).
pub fn decode_portlist(data: &[u8]) -> Vec<u32> {
    data.iter()
        .enumerate()
        .flat_map(|(byte_idx, byte)| {
            (0..8u32)
                .filter(move |bit| byte & (0x80 >> bit) != 0)
                .map(move |bit| byte_idx as u32 * 8 + bit + 1)
        })
        .collect()
}

/// `(vlan, bridge ports)` from a dot1qVlanCurrentEgressPorts walk, in walk order.
pub fn vlan_egress_ports(rows: &[WalkRow]) -> Vec<(u64, Vec<u32>)> {
    rows.iter()
        .filter_map(|(oid, value)| {
            let vlan = *index_of(oid, OID_DOT1Q_VLAN_CURRENT_EGRESS_PORTS)?.last()?;
            Some((vlan, decode_portlist(value.as_bytes()?)))
        })
        .collect()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
