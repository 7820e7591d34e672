#![cfg(test)]
use std::collections::HashMap;

use lanscope_common::config::{DiscoveryConfig, ManualLink, SwitchTarget};
use lanscope_common::error::DiscoveryError;
use lanscope_common::network::topology::{L2Source, NetworkTopology};
use lanscope_core::topology::Discovery;
use lanscope_protocols::snmp::{
    OID_DOT1D_BASE_PORT_IF_INDEX, OID_DOT1Q_TP_FDB_PORT, OID_IF_DESCR, SnmpValue,
};

use crate::fakes::{CannedRemote, FakeLan, ScriptedRunner, SwitchScript};

const GATEWAY: &str = "10.0.0.1";
const CORE_SW: &str = "10.0.0.2";
const EDGE_SW: &str = "10.0.0.3";
const HOST: &str = "10.0.0.5";

const EDGE_LLDP: &str = r#"{"lldp": {"interface": {"eth0": {
    "chassis": {"id": {"type": "mac", "value": "A0:40:A0:00:00:03"}, "name": "edge-sw"},
    "port": {"id": {"type": "ifname", "value": "g9"}}
}}}}"#;

fn oid(base: &[u64], index: &[u64]) -> Vec<u64> {
    base.iter().chain(index).copied().collect()
}

/// Gateway, two switches and one end host on eth0.
fn lan() -> FakeLan {
    FakeLan::default()
        .neighbor(GATEWAY, "00:00:5e:00:00:01")
        .neighbor(CORE_SW, "a0:40:a0:00:00:02")
        .neighbor(EDGE_SW, "a0:40:a0:00:00:03")
        .neighbor(HOST, "aa:00:00:00:00:05")
        .name(GATEWAY, "router.lan")
        .name(HOST, "nas.lan")
}

/// Learned the end host on bridge port 5 (ifIndex 5).
fn core_switch() -> SwitchScript {
    SwitchScript::named("core-sw")
        .rows(
            OID_IF_DESCR,
            vec![(
                oid(OID_IF_DESCR, &[5]),
                SnmpValue::OctetString(b"unit 1 port 5 Gigabit - Level".to_vec()),
            )],
        )
        .rows(
            OID_DOT1D_BASE_PORT_IF_INDEX,
            vec![(oid(OID_DOT1D_BASE_PORT_IF_INDEX, &[5]), SnmpValue::Integer(5))],
        )
        .rows(
            OID_DOT1Q_TP_FDB_PORT,
            vec![(
                oid(OID_DOT1Q_TP_FDB_PORT, &[1, 0xaa, 0, 0, 0, 0, 5]),
                SnmpValue::Integer(5),
            )],
        )
}

fn switch(ip: &str) -> SwitchTarget {
    SwitchTarget {
        ip: ip.into(),
        community: "public".into(),
    }
}

fn snmp_config() -> DiscoveryConfig {
    DiscoveryConfig {
        switches: vec![switch(CORE_SW)],
        ..Default::default()
    }
}

async fn run(config: DiscoveryConfig, lan: FakeLan) -> NetworkTopology {
    Discovery::new(config, lan.capabilities())
        .run()
        .await
        .expect("discovery failed")
}

fn is_infrastructure(topology: &NetworkTopology, ip: &str) -> bool {
    topology
        .local_hosts
        .iter()
        .any(|h| h.ip == ip && h.is_infrastructure)
}

#[tokio::test]
async fn snmp_learned_port_becomes_the_parent() {
    let topology = run(snmp_config(), lan().switch(CORE_SW, core_switch())).await;

    assert_eq!(topology.topology_tree[HOST], CORE_SW);
    assert_eq!(topology.l2_topology.len(), 1);

    let entry = &topology.l2_topology[0];
    assert_eq!(entry.source, L2Source::Snmp);
    assert_eq!(entry.host_ip, HOST);
    assert_eq!(entry.switch.port_index, 5);
    assert_eq!(entry.switch.port_name, "U1/g5");
    assert_eq!(entry.switch.switch_name, "core-sw");

    // Everything else hangs off the gateway once L2 data exists.
    assert_eq!(topology.topology_tree[CORE_SW], GATEWAY);
    assert_eq!(topology.topology_tree[EDGE_SW], GATEWAY);
    assert!(!topology.topology_tree.contains_key(GATEWAY));
    assert!(is_infrastructure(&topology, CORE_SW));

    assert_eq!(topology.local_interface.name, "eth0");
    assert_eq!(topology.gateway.as_ref().map(|g| g.ip.as_str()), Some(GATEWAY));

    let json = serde_json::to_value(&topology).unwrap();
    assert_eq!(json["l2_topology"][0]["source"], "snmp");
    assert_eq!(json["topology_tree"][HOST], CORE_SW);
}

#[tokio::test]
async fn unreachable_switch_is_left_out() {
    let config = DiscoveryConfig {
        switches: vec![switch("10.0.0.99"), switch(CORE_SW)],
        ..Default::default()
    };
    let topology = run(config, lan().switch(CORE_SW, core_switch())).await;

    assert_eq!(topology.l2_topology.len(), 1);
    assert_eq!(topology.topology_tree[HOST], CORE_SW);
}

#[tokio::test]
async fn gateway_listed_as_switch_stays_plain() {
    let config = DiscoveryConfig {
        switches: vec![switch(GATEWAY), switch(CORE_SW)],
        ..Default::default()
    };
    let topology = run(config, lan().switch(CORE_SW, core_switch())).await;

    assert!(!is_infrastructure(&topology, GATEWAY));
    assert!(is_infrastructure(&topology, CORE_SW));
    assert!(!topology.topology_tree.contains_key(GATEWAY));
}

#[tokio::test]
async fn lldp_cannot_loop_or_parent_the_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let core_says_edge = EDGE_LLDP;
    let edge_says_core = EDGE_LLDP.replace("A0:40:A0:00:00:03", "A0:40:A0:00:00:02");
    std::fs::write(dir.path().join(format!("{CORE_SW}.json")), core_says_edge).unwrap();
    std::fs::write(dir.path().join(format!("{EDGE_SW}.json")), &edge_says_core).unwrap();
    std::fs::write(dir.path().join(format!("{GATEWAY}.json")), &edge_says_core).unwrap();

    let config = DiscoveryConfig {
        lldp_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    let topology = run(config, lan()).await;

    assert_eq!(topology.topology_tree[CORE_SW], EDGE_SW);
    assert_eq!(topology.topology_tree[EDGE_SW], GATEWAY);
    assert!(!topology.topology_tree.contains_key(GATEWAY));
    assert_eq!(topology.l2_topology.len(), 1);
    assert!(!is_infrastructure(&topology, GATEWAY));
}

#[tokio::test]
async fn unmatched_lldp_neighbor_leaves_snmp_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let stranger = EDGE_LLDP.replace("A0:40:A0:00:00:03", "DE:AD:00:00:00:01").replace("edge-sw", "stranger");
    std::fs::write(dir.path().join(format!("{HOST}.json")), stranger).unwrap();

    let config = DiscoveryConfig {
        lldp_dir: Some(dir.path().to_path_buf()),
        ..snmp_config()
    };
    let topology = run(config, lan().switch(CORE_SW, core_switch())).await;

    assert_eq!(topology.topology_tree[HOST], CORE_SW);
    assert_eq!(topology.l2_topology.len(), 1);
    assert_eq!(topology.l2_topology[0].source, L2Source::Snmp);
    assert_eq!(topology.l2_topology[0].switch.switch_ip, CORE_SW);
}

#[tokio::test]
async fn lldp_files_override_snmp() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(format!("{HOST}.json")), EDGE_LLDP).unwrap();
    std::fs::write(dir.path().join("10.9.9.9.json"), EDGE_LLDP).unwrap();
    std::fs::write(dir.path().join(format!("{CORE_SW}.json")), "{not json").unwrap();

    let config = DiscoveryConfig {
        lldp_dir: Some(dir.path().to_path_buf()),
        ..snmp_config()
    };
    let topology = run(config, lan().switch(CORE_SW, core_switch())).await;

    assert_eq!(topology.topology_tree[HOST], EDGE_SW);
    assert_eq!(topology.l2_topology.len(), 1);
    let entry = &topology.l2_topology[0];
    assert_eq!(entry.source, L2Source::Lldp);
    assert_eq!(entry.switch.port_name, "g9");
    assert!(is_infrastructure(&topology, EDGE_SW));
    assert!(is_infrastructure(&topology, CORE_SW));
}

#[tokio::test]
async fn collected_lldp_is_read_back() {
    let root = tempfile::tempdir().unwrap();
    let collect_dir = root.path().join("lldp").join("run-1");
    let remote = CannedRemote {
        replies: HashMap::from([
            (HOST.to_string(), EDGE_LLDP.to_string()),
            (GATEWAY.to_string(), EDGE_LLDP.to_string()),
        ]),
        ..Default::default()
    };
    let lan = lan().remote(remote);
    let asked = lan.remote.clone();

    let config = DiscoveryConfig {
        lldp_collect_dir: Some(collect_dir.clone()),
        ..Default::default()
    };
    let topology = run(config, lan).await;

    assert!(collect_dir.join(format!("{HOST}.json")).is_file());
    assert!(!collect_dir.join(format!("{GATEWAY}.json")).exists());
    assert!(!asked.asked.lock().unwrap().contains(GATEWAY));
    assert_eq!(topology.topology_tree[HOST], EDGE_SW);
    assert_eq!(topology.topology_tree[CORE_SW], GATEWAY);
}

#[tokio::test]
async fn manual_links_win_and_stay_in_their_subnet() {
    let config = DiscoveryConfig {
        manual_topology: vec![
            ManualLink {
                host_ip: HOST.into(),
                switch_ip: EDGE_SW.into(),
                port_name: "g7".into(),
            },
            ManualLink {
                host_ip: "192.168.50.5".into(),
                switch_ip: EDGE_SW.into(),
                port_name: "g8".into(),
            },
        ],
        ..snmp_config()
    };
    let topology = run(config, lan().switch(CORE_SW, core_switch())).await;

    assert_eq!(topology.topology_tree[HOST], EDGE_SW);
    assert!(!topology.topology_tree.contains_key("192.168.50.5"));
    assert_eq!(topology.l2_topology.len(), 1);
    let entry = &topology.l2_topology[0];
    assert_eq!(entry.source, L2Source::Manual);
    assert_eq!(entry.host_mac, "aa:00:00:00:00:05");
    assert_eq!(entry.switch.port_index, 0);
    assert!(is_infrastructure(&topology, EDGE_SW));
}

fn tracing_runner() -> ScriptedRunner {
    ScriptedRunner::lan()
        .with(
            &format!("tracepath -n -m 5 {CORE_SW}"),
            " 1?: [LOCALHOST]     pmtu 1500\n 1:  10.0.0.2    0.300ms reached\n",
        )
        .with(
            &format!("tracepath -n -m 5 {EDGE_SW}"),
            " 1:  10.0.0.1    0.310ms\n 2:  10.0.0.2    0.512ms\n 3:  10.0.0.3    0.901ms reached\n",
        )
        .with(
            &format!("tracepath -n -m 5 {HOST}"),
            " 1:  10.0.0.1    0.290ms\n 2:  no reply\n",
        )
}

#[tokio::test]
async fn traces_build_the_tree_without_l2_data() {
    let config = DiscoveryConfig {
        trace_local: true,
        ..Default::default()
    };
    let topology = run(config, lan().runner(tracing_runner())).await;

    assert!(topology.l2_topology.is_empty());
    assert_eq!(topology.topology_tree[CORE_SW], GATEWAY);
    assert_eq!(topology.topology_tree[EDGE_SW], CORE_SW);
    assert_eq!(topology.topology_tree[HOST], GATEWAY);
    assert!(is_infrastructure(&topology, CORE_SW));
    assert!(!is_infrastructure(&topology, GATEWAY));
}

#[tokio::test]
async fn traces_are_skipped_when_l2_data_exists() {
    let lan = lan()
        .runner(tracing_runner())
        .switch(CORE_SW, core_switch());
    let runner = lan.runner.clone();
    let config = DiscoveryConfig {
        trace_local: true,
        ..snmp_config()
    };
    let topology = run(config, lan).await;

    assert_eq!(topology.topology_tree[EDGE_SW], GATEWAY);
    assert!(!runner.calls().iter().any(|c| c.starts_with("tracepath")));
}

#[tokio::test]
async fn without_any_source_the_tree_is_empty() {
    let topology = run(DiscoveryConfig::default(), lan()).await;
    assert!(topology.topology_tree.is_empty());
    assert_eq!(topology.local_hosts.len(), 4);
    assert!(topology.local_hosts[0].is_gateway);
}

#[tokio::test]
async fn interfaces_are_scanned_in_order_and_merged() {
    let runner = ScriptedRunner::lan()
        .with(
            "ip -4 addr show dev wlan0",
            "3: wlan0: <BROADCAST,UP>\n    inet 192.168.7.20/24 brd 192.168.7.255 scope global wlan0\n",
        )
        .with(
            "ip -4 route show dev wlan0",
            "192.168.7.0/24 proto kernel scope link src 192.168.7.20\n",
        );
    let lan = lan()
        .runner(runner)
        .neighbor_on("wlan0", "192.168.7.30", "aa:00:00:00:07:30");
    let config = DiscoveryConfig {
        interfaces: vec!["eth0".into(), "tun0".into(), "wlan0".into()],
        ..Default::default()
    };

    let topology = run(config, lan).await;

    let names: Vec<&str> = topology.subnets.iter().map(|s| s.interface.name.as_str()).collect();
    assert_eq!(names, ["eth0", "wlan0"]);
    assert_eq!(topology.local_interface.name, "eth0");
    assert_eq!(topology.gateway.as_ref().map(|g| g.ip.as_str()), Some(GATEWAY));
    assert!(topology.subnets[1].gateway.is_none());
    assert_eq!(topology.local_hosts.len(), 5);
    assert!(topology.local_hosts.iter().any(|h| h.ip == "192.168.7.30"));
}

#[tokio::test]
async fn no_usable_subnet_is_fatal() {
    let runner = ScriptedRunner::default().with(
        "ip -4 route show default",
        "default via 10.0.0.1 dev eth0 proto dhcp metric 100\n",
    );
    let err = Discovery::new(DiscoveryConfig::default(), lan().runner(runner).capabilities())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DiscoveryError>(),
        Some(DiscoveryError::NoUsableSubnet)
    ));
}

#[tokio::test]
async fn invalid_interface_name_is_fatal() {
    let config = DiscoveryConfig {
        interfaces: vec!["eth0;reboot".into()],
        ..Default::default()
    };
    let err = Discovery::new(config, lan().capabilities())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DiscoveryError>(),
        Some(DiscoveryError::InvalidInterfaceName(name)) if name == "eth0;reboot"
    ));
}

#[tokio::test]
async fn explicit_targets_are_traced_with_full_hop_budget() {
    let runner = ScriptedRunner::lan().with(
        "tracepath -n -m 30 dns.google",
        " 1:  10.0.0.1    0.700ms\n 2:  no reply\n 3:  8.8.8.8    12.500ms reached\n",
    );
    let lan = lan().runner(runner).name("8.8.8.8", "dns.google");
    let config = DiscoveryConfig {
        traceroute_targets: vec!["dns.google".into(), "nowhere.invalid".into()],
        ..Default::default()
    };

    let topology = run(config, lan).await;

    assert_eq!(topology.traceroute_paths.len(), 1);
    let path = &topology.traceroute_paths[0];
    assert!(path.completed);
    assert_eq!(path.target, "dns.google");
    assert_eq!(path.hops.len(), 3);
    assert_eq!(path.hops[0].hostname, "router.lan");
    assert!(path.hops[1].is_timeout);
}
