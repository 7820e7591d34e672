//! Scripted stand-ins for every capability the pipeline touches.

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use pnet::ipnetwork::Ipv4Network;

use lanscope_common::config::SwitchTarget;
use lanscope_common::error::{RemoteExecError, SnmpError};
use lanscope_common::vendors::NoVendors;
use lanscope_core::dns::ReverseDns;
use lanscope_core::lldp::RemoteExec;
use lanscope_core::network::arp::ArpSweep;
use lanscope_core::snmp::{SnmpConnector, SnmpSession};
use lanscope_core::system::CommandRunner;
use lanscope_core::topology::Capabilities;
use lanscope_protocols::snmp::{SnmpValue, WalkRow};

/// Answers commands from a table keyed by the full command line. Every
/// program named in the table counts as installed.
#[derive(Default)]
pub struct ScriptedRunner {
    outputs: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    /// `eth0` at 10.0.0.10/24 with its default route through 10.0.0.1.
    pub fn lan() -> Self {
        Self::default()
            .with(
                "ip -4 route show default",
                "default via 10.0.0.1 dev eth0 proto dhcp metric 100\n",
            )
            .with(
                "ip -4 addr show dev eth0",
                "2: eth0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500\n    \
                 inet 10.0.0.10/24 brd 10.0.0.255 scope global eth0\n",
            )
            .with(
                "ip link show dev eth0",
                "2: eth0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500\n    \
                 link/ether dc:a6:32:00:00:10 brd ff:ff:ff:ff:ff:ff\n",
            )
    }

    pub fn with(mut self, command_line: &str, output: &str) -> Self {
        self.outputs.insert(command_line.to_string(), output.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, program: &str, args: &[&str]) -> String {
        let line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(line.clone());
        }
        line
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn output(&self, program: &str, args: &[&str], _timeout: Duration) -> Option<String> {
        let line = self.record(program, args);
        self.outputs.get(&line).cloned()
    }

    async fn stream(
        &self,
        program: &str,
        args: &[&str],
        _timeout: Duration,
        on_line: &mut (dyn FnMut(&str) + Send),
    ) -> anyhow::Result<()> {
        let line = self.record(program, args);
        let Some(out) = self.outputs.get(&line) else {
            bail!("{program} not found");
        };
        for l in out.lines() {
            on_line(l);
        }
        Ok(())
    }

    fn has_program(&self, program: &str) -> bool {
        self.outputs
            .keys()
            .any(|line| line.split_whitespace().next() == Some(program))
    }
}

/// An ARP sweep answering with fixed neighbors per interface.
pub struct CannedSweep(pub HashMap<String, Vec<(String, String)>>);

#[async_trait]
impl ArpSweep for CannedSweep {
    async fn sweep(
        &self,
        interface: &str,
        _source: Ipv4Addr,
        _network: Ipv4Network,
        _window: Duration,
    ) -> Option<Vec<(String, String)>> {
        Some(self.0.get(interface).cloned().unwrap_or_default())
    }
}

/// Forward and reverse lookups from one `ip -> name` table.
#[derive(Default)]
pub struct NameTable(pub HashMap<String, String>);

#[async_trait]
impl ReverseDns for NameTable {
    async fn reverse(&self, ip: &str) -> String {
        self.0.get(ip).cloned().unwrap_or_default()
    }

    async fn resolve(&self, name: &str) -> Option<String> {
        if name.parse::<Ipv4Addr>().is_ok() {
            return Some(name.to_string());
        }
        self.0
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(ip, _)| ip.clone())
    }
}

/// One switch's tables, keyed by the walked base OID.
#[derive(Debug, Default, Clone)]
pub struct SwitchScript {
    pub sys_name: String,
    pub walks: HashMap<Vec<u64>, Vec<WalkRow>>,
}

impl SwitchScript {
    pub fn named(sys_name: &str) -> Self {
        Self {
            sys_name: sys_name.to_string(),
            walks: HashMap::new(),
        }
    }

    pub fn rows(mut self, base: &[u64], rows: Vec<WalkRow>) -> Self {
        self.walks.entry(base.to_vec()).or_default().extend(rows);
        self
    }
}

/// Switches not in the table time out.
#[derive(Default)]
pub struct ScriptedSwitches(pub HashMap<String, SwitchScript>);

struct ScriptedSession(SwitchScript);

#[async_trait]
impl SnmpSession for ScriptedSession {
    async fn get(&mut self, _oid: &[u64]) -> Result<SnmpValue, SnmpError> {
        Ok(SnmpValue::OctetString(self.0.sys_name.clone().into_bytes()))
    }

    async fn walk(&mut self, base: &[u64]) -> Result<Vec<WalkRow>, SnmpError> {
        Ok(self.0.walks.get(base).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl SnmpConnector for ScriptedSwitches {
    async fn connect(&self, target: &SwitchTarget) -> Result<Box<dyn SnmpSession>, SnmpError> {
        match self.0.get(&target.ip) {
            Some(script) => Ok(Box::new(ScriptedSession(script.clone()))),
            None => Err(SnmpError::Timeout(target.ip.clone())),
        }
    }
}

/// Remote hosts answering with canned output; everyone else refuses.
#[derive(Default)]
pub struct CannedRemote {
    pub replies: HashMap<String, String>,
    pub asked: Mutex<HashSet<String>>,
}

#[async_trait]
impl RemoteExec for CannedRemote {
    async fn run(&self, host: &str, _command: &str) -> Result<String, RemoteExecError> {
        if let Ok(mut asked) = self.asked.lock() {
            asked.insert(host.to_string());
        }
        self.replies
            .get(host)
            .cloned()
            .ok_or_else(|| RemoteExecError::Connect(host.to_string(), "connection refused".into()))
    }
}

/// Every capability scripted, with nothing seen on the wire.
pub struct FakeLan {
    pub runner: Arc<ScriptedRunner>,
    pub neighbors: HashMap<String, Vec<(String, String)>>,
    pub names: HashMap<String, String>,
    pub switches: ScriptedSwitches,
    pub remote: Arc<CannedRemote>,
}

impl Default for FakeLan {
    fn default() -> Self {
        Self {
            runner: Arc::new(ScriptedRunner::lan()),
            neighbors: HashMap::new(),
            names: HashMap::new(),
            switches: ScriptedSwitches::default(),
            remote: Arc::new(CannedRemote::default()),
        }
    }
}

impl FakeLan {
    /// A neighbor on `eth0`.
    pub fn neighbor(self, ip: &str, mac: &str) -> Self {
        self.neighbor_on("eth0", ip, mac)
    }

    pub fn neighbor_on(mut self, interface: &str, ip: &str, mac: &str) -> Self {
        self.neighbors
            .entry(interface.to_string())
            .or_default()
            .push((ip.to_string(), mac.to_string()));
        self
    }

    pub fn name(mut self, ip: &str, name: &str) -> Self {
        self.names.insert(ip.to_string(), name.to_string());
        self
    }

    pub fn switch(mut self, ip: &str, script: SwitchScript) -> Self {
        self.switches.0.insert(ip.to_string(), script);
        self
    }

    pub fn runner(mut self, runner: ScriptedRunner) -> Self {
        self.runner = Arc::new(runner);
        self
    }

    pub fn remote(mut self, remote: CannedRemote) -> Self {
        self.remote = Arc::new(remote);
        self
    }

    pub fn capabilities(self) -> Capabilities {
        Capabilities {
            runner: self.runner,
            arp: Arc::new(CannedSweep(self.neighbors)),
            dns: Arc::new(NameTable(self.names)),
            vendors: Arc::new(NoVendors),
            snmp: Arc::new(self.switches),
            remote: self.remote,
        }
    }
}
