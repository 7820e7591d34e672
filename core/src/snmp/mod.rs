//! Switch forwarding-table discovery over SNMP v2c and the host -> switch
//! inference built on it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use lanscope_common::config::SwitchTarget;
use lanscope_common::error::SnmpError;
use lanscope_common::network::host::DiscoveredHost;
use lanscope_common::network::topology::{
    L2Source, L2TopologyEntry, SwitchPortMapping, TopologyTree, creates_loop,
};
use lanscope_protocols::bridge::{BridgeTables, vlan_egress_ports};
use lanscope_protocols::snmp::{
    DisplayOid, OID_DOT1D_BASE_PORT_IF_INDEX, OID_DOT1D_TP_FDB_PORT, OID_DOT1Q_TP_FDB_PORT,
    OID_DOT1Q_VLAN_CURRENT_EGRESS_PORTS, OID_IF_DESCR, OID_SYS_NAME, SnmpValue, WalkRow,
};

pub mod client;

/// `mac -> mappings`, one mapping per switch that learned the MAC, in the
/// order the switches were configured.
pub type MacTable = HashMap<String, Vec<SwitchPortMapping>>;

#[async_trait]
pub trait SnmpConnector: Send + Sync {
    async fn connect(&self, target: &SwitchTarget) -> Result<Box<dyn SnmpSession>, SnmpError>;
}

#[async_trait]
pub trait SnmpSession: Send {
    async fn get(&mut self, oid: &[u64]) -> Result<SnmpValue, SnmpError>;

    /// Every row below `base`, in OID order.
    async fn walk(&mut self, base: &[u64]) -> Result<Vec<WalkRow>, SnmpError>;
}

pub struct SnmpBridgeDiscoverer {
    connector: Arc<dyn SnmpConnector>,
}

impl SnmpBridgeDiscoverer {
    pub fn new(connector: Arc<dyn SnmpConnector>) -> Self {
        Self { connector }
    }

    /// Queries every switch concurrently and merges their forwarding tables.
    ///
    /// A switch that fails is logged and contributes nothing.
    pub async fn discover(&self, switches: &[SwitchTarget]) -> MacTable {
        let mut set = JoinSet::new();
        for (order, target) in switches.iter().cloned().enumerate() {
            let connector = Arc::clone(&self.connector);
            set.spawn(async move {
                let result = query_switch(connector.as_ref(), &target).await;
                (order, target.ip, result)
            });
        }

        let mut per_switch = Vec::with_capacity(switches.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((order, _, Ok(mappings))) => per_switch.push((order, mappings)),
                Ok((_, ip, Err(e))) => error!("SNMP query failed for {ip}: {e}"),
                Err(e) => error!("Switch query task failed: {e}"),
            }
        }
        per_switch.sort_by_key(|(order, _)| *order);

        let mut merged = MacTable::new();
        for (_, mappings) in per_switch {
            for (mac, mapping) in mappings {
                merged.entry(mac).or_default().push(mapping);
            }
        }
        merged
    }
}

async fn query_switch(
    connector: &dyn SnmpConnector,
    target: &SwitchTarget,
) -> Result<Vec<(String, SwitchPortMapping)>, SnmpError> {
    let ip = target.ip.as_str();
    info!("SNMP querying switch {ip} (community: {})...", target.community);
    let mut session = connector.connect(target).await?;

    let sys_name = match session.get(OID_SYS_NAME).await {
        Ok(value) => value.as_text().map(|name| name.trim().to_string()).unwrap_or_default(),
        Err(e) => {
            warn!("  {ip}: sysName unavailable: {e}");
            String::new()
        }
    };
    let if_descr = walk_or_empty(&mut *session, ip, OID_IF_DESCR).await;
    let base_port_if_index = walk_or_empty(&mut *session, ip, OID_DOT1D_BASE_PORT_IF_INDEX).await;
    let q_fdb_port = walk_or_empty(&mut *session, ip, OID_DOT1Q_TP_FDB_PORT).await;
    let fdb_port = if q_fdb_port.is_empty() {
        walk_or_empty(&mut *session, ip, OID_DOT1D_TP_FDB_PORT).await
    } else {
        Vec::new()
    };

    let tables = BridgeTables {
        sys_name,
        if_descr,
        base_port_if_index,
        q_fdb_port,
        fdb_port,
    };
    if tables.uses_q_bridge() {
        info!("  {ip}: {} MAC entries via Q-BRIDGE-MIB", tables.q_fdb_port.len());
        // Informational only; never fails the switch.
        match session.walk(OID_DOT1Q_VLAN_CURRENT_EGRESS_PORTS).await {
            Ok(rows) => {
                for (vlan, ports) in vlan_egress_ports(&rows) {
                    debug!("  {ip}: VLAN {vlan} egress ports {ports:?}");
                }
            }
            Err(e) => debug!("  {ip}: no VLAN egress table: {e}"),
        }
    } else {
        info!("  {ip}: {} MAC entries via BRIDGE-MIB", tables.fdb_port.len());
    }

    let mappings = tables.mac_mappings(ip);
    info!("  {ip} ({}): {} MAC->port mappings", tables.sys_name, mappings.len());
    Ok(mappings)
}

/// Cross-references scanned hosts with the merged forwarding tables.
///
/// A port is an uplink when another queried switch's own MAC was learned on
/// it. Hosts attach to the first mapping that is not an uplink, or to the
/// first mapping when every one is. Queried switches attach to the switch
/// that learned their MAC, skipping edges that would close a loop. The
/// gateway never gets a parent.
pub fn build_l2_topology(
    hosts: &[DiscoveredHost],
    mac_table: &MacTable,
    switch_ips: &HashSet<String>,
) -> (Vec<L2TopologyEntry>, TopologyTree) {
    let switch_macs: Vec<(&DiscoveredHost, String)> = hosts
        .iter()
        .filter(|h| switch_ips.contains(&h.ip) && !h.mac.is_empty())
        .map(|h| (h, h.mac.to_lowercase()))
        .collect();

    let mut uplinks: HashSet<(&str, u64)> = HashSet::new();
    for (switch, mac) in &switch_macs {
        for mapping in mac_table.get(mac).into_iter().flatten() {
            if mapping.switch_ip != switch.ip {
                uplinks.insert((mapping.switch_ip.as_str(), mapping.port_index));
            }
        }
    }

    let mut entries = Vec::new();
    let mut tree = TopologyTree::new();

    for host in hosts {
        if host.mac.is_empty() || host.is_gateway || switch_ips.contains(&host.ip) {
            continue;
        }
        let Some(mappings) = mac_table.get(&host.mac.to_lowercase()) else {
            continue;
        };
        let Some(best) = mappings
            .iter()
            .find(|m| !uplinks.contains(&(m.switch_ip.as_str(), m.port_index)))
            .or_else(|| mappings.first())
        else {
            continue;
        };

        tree.insert(host.ip.clone(), best.switch_ip.clone());
        entries.push(snmp_entry(host, best));
    }

    for (switch, mac) in &switch_macs {
        if switch.is_gateway {
            continue;
        }
        let Some(mappings) = mac_table.get(mac) else {
            continue;
        };
        let parent = mappings
            .iter()
            .filter(|m| m.switch_ip != switch.ip)
            .find(|m| !creates_loop(&tree, &switch.ip, &m.switch_ip));
        match parent {
            Some(mapping) => {
                tree.insert(switch.ip.clone(), mapping.switch_ip.clone());
                entries.push(snmp_entry(switch, mapping));
            }
            None => debug!("{}: no loop-free upstream switch", switch.ip),
        }
    }

    (entries, tree)
}

/// A failed walk yields no rows so the remaining tables are still queried.
async fn walk_or_empty(session: &mut dyn SnmpSession, ip: &str, base: &[u64]) -> Vec<WalkRow> {
    match session.walk(base).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!("  {ip}: walk of {} failed: {e}", DisplayOid(base));
            Vec::new()
        }
    }
}

fn snmp_entry(host: &DiscoveredHost, mapping: &SwitchPortMapping) -> L2TopologyEntry {
    L2TopologyEntry {
        host_ip: host.ip.clone(),
        host_mac: host.mac.clone(),
        switch: mapping.clone(),
        source: L2Source::Snmp,
    }
}
