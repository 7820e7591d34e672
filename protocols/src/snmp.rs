//! Transport-neutral SNMP values and the MIB objects used for bridge discovery.

use std::fmt;

/// SNMPv2-MIB sysName.0
pub const OID_SYS_NAME: &[u64] = &[1, 3, 6, 1, 2, 1, 1, 5, 0];
/// IF-MIB ifDescr
pub const OID_IF_DESCR: &[u64] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 2];
/// BRIDGE-MIB dot1dTpFdbPort
pub const OID_DOT1D_TP_FDB_PORT: &[u64] = &[1, 3, 6, 1, 2, 1, 17, 4, 3, 1, 2];
/// BRIDGE-MIB dot1dBasePortIfIndex
pub const OID_DOT1D_BASE_PORT_IF_INDEX: &[u64] = &[1, 3, 6, 1, 2, 1, 17, 1, 4, 1, 2];
/// Q-BRIDGE-MIB dot1qTpFdbPort, indexed by VLAN + 6 MAC octets.
pub const OID_DOT1Q_TP_FDB_PORT: &[u64] = &[1, 3, 6, 1, 2, 1, 17, 7, 1, 2, 2, 1, 2];
/// Q-BRIDGE-MIB dot1qVlanCurrentEgressPorts, indexed by TimeMark + VLAN.
pub const OID_DOT1Q_VLAN_CURRENT_EGRESS_PORTS: &[u64] = &[1, 3, 6, 1, 2, 1, 17, 7, 1, 4, 2, 1, 4];

/// Owned copy of a varbind value, detached from the response buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnmpValue {
    Integer(i64),
    OctetString(Vec<u8>),
    Counter32(u32),
    Unsigned32(u32),
    Timeticks(u32),
    Counter64(u64),
    /// NoSuchObject, NoSuchInstance, EndOfMibView and anything unhandled.
    Unknown,
}

impl SnmpValue {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            SnmpValue::Integer(i) => u64::try_from(*i).ok(),
            SnmpValue::Counter32(v) | SnmpValue::Unsigned32(v) | SnmpValue::Timeticks(v) => {
                Some(u64::from(*v))
            }
            SnmpValue::Counter64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            SnmpValue::OctetString(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            SnmpValue::OctetString(bytes) => Some(String::from_utf8_lossy(bytes).to_string()),
            _ => None,
        }
    }
}

/// One row of a walked subtree: the full OID and its value.
pub type WalkRow = (Vec<u64>, SnmpValue);

/// Dotted form, e.g. `1.3.6.1.2.1.1.5.0`.
pub fn format_oid(oid: &[u64]) -> String {
    oid.iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

pub fn parse_oid(s: &str) -> Option<Vec<u64>> {
    s.trim()
        .trim_start_matches('.')
        .split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect()
}

/// Index components of `oid` below `base`, or `None` if `oid` is outside the subtree.
pub fn index_of<'a>(oid: &'a [u64], base: &[u64]) -> Option<&'a [u64]> {
    oid.strip_prefix(base).filter(|rest| !rest.is_empty())
}

pub struct DisplayOid<'a>(pub &'a [u64]);

impl fmt::Display for DisplayOid<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_oid(self.0))
    }
}
