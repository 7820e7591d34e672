//! The discovery engine behind `lanscope`.
//!
//! Each stage talks to the outside world only through the capability traits
//! defined next to it ([`system::CommandRunner`], [`network::arp::ArpSweep`],
//! [`dns::ReverseDns`], [`snmp::SnmpConnector`], [`lldp::RemoteExec`],
//! [`lanscope_common::vendors::VendorRepository`]). [`topology::Discovery`]
//! wires them together and folds every source into one
//! [`NetworkTopology`](lanscope_common::network::topology::NetworkTopology).

pub mod dns;
pub mod interface;
pub mod lldp;
pub mod network;
pub mod scanner;
pub mod snmp;
pub mod system;
pub mod topology;
pub mod trace;
pub mod vendors;

#[cfg(test)]
pub(crate) mod testing;
