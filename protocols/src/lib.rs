//! Parsers and builders for every text or wire format `lanscope` consumes.
//!
//! Nothing here performs I/O. The engine in `lanscope-core` runs the
//! subprocesses and sockets and hands their raw output to these functions.

pub mod arp;
pub mod bridge;
pub mod iproute;
pub mod lldp;
pub mod nmap;
pub mod snmp;
pub mod trace;
