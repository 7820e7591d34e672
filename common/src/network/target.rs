//! # Traceroute Target Parsing
//!
//! Expands the `--targets` argument into individual trace targets. Each
//! comma-separated part may be:
//! * A single IPv4 address or hostname (`192.168.1.5`, `gateway.lan`).
//! * An IPv4 range (`192.168.1.1-50`, `192.168.1.1-192.168.1.50`).
//! * A CIDR block (`192.168.1.0/24`), expanded to its usable hosts.
//!
//! Malformed parts are skipped with a warning; they never abort the run.

use std::net::Ipv4Addr;

use tracing::warn;

use crate::error::InputError;
use crate::network::range::{self, Ipv4Range};

/// Upper bound on addresses produced by one range or CIDR part.
const MAX_EXPANSION: usize = 65_536;

/// One classified `--targets` part.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TargetSpec {
    Range(Ipv4Range),
    Cidr { ip: Ipv4Addr, prefix: u8 },
    Single(String),
}

impl TargetSpec {
    fn expand(self) -> Result<Vec<String>, InputError> {
        let addrs: Vec<Ipv4Addr> = match self {
            TargetSpec::Single(target) => return Ok(vec![target]),
            TargetSpec::Range(range) => range.to_iter().take(MAX_EXPANSION).collect(),
            TargetSpec::Cidr { ip, prefix } => {
                let net = range::subnet_of(ip, prefix).map_err(|_| InputError::Malformed {
                    entry: format!("{ip}/{prefix}"),
                    expected: "a CIDR prefix of at most 32",
                })?;
                range::host_addresses(net, MAX_EXPANSION)
            }
        };
        Ok(addrs.iter().map(Ipv4Addr::to_string).collect())
    }
}

pub fn expand_targets(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .flat_map(|part| match classify(part).and_then(TargetSpec::expand) {
            Ok(expanded) => expanded,
            Err(e) => {
                warn!("Skipping target '{part}': {e}");
                Vec::new()
            }
        })
        .collect()
}

/// A part whose text before `-` is not an IPv4 address is a hostname, since
/// hostnames may contain dashes.
fn classify(part: &str) -> Result<TargetSpec, InputError> {
    if let Some((ip, prefix)) = part.split_once('/') {
        let ip = ip
            .parse::<Ipv4Addr>()
            .map_err(|_| InputError::InvalidIp(ip.to_string()))?;
        let prefix = prefix.parse::<u8>().map_err(|_| InputError::Malformed {
            entry: part.to_string(),
            expected: "IP/PREFIX",
        })?;
        return Ok(TargetSpec::Cidr { ip, prefix });
    }

    if let Some((first, last)) = part.split_once('-')
        && let Ok(first) = first.parse::<Ipv4Addr>()
    {
        let last = range_end(first, last).ok_or_else(|| InputError::Malformed {
            entry: part.to_string(),
            expected: "FIRST-LAST with LAST an address or trailing octets",
        })?;
        if last < first {
            return Err(InputError::Malformed {
                entry: part.to_string(),
                expected: "a range whose end is not below its start",
            });
        }
        return Ok(TargetSpec::Range(Ipv4Range::new(first, last)));
    }

    Ok(TargetSpec::Single(part.to_string()))
}

/// End of a range: a full address, or trailing octets that replace the
/// matching tail of `first` (`10.0.0.7` + `2.66` -> `10.0.2.66`).
fn range_end(first: Ipv4Addr, last: &str) -> Option<Ipv4Addr> {
    if let Ok(full) = last.parse::<Ipv4Addr>() {
        return Some(full);
    }
    let tail = last
        .split('.')
        .map(|octet| octet.parse::<u8>().ok())
        .collect::<Option<Vec<u8>>>()?;
    if tail.is_empty() || tail.len() > 4 {
        return None;
    }
    let mut octets = first.octets();
    octets[4 - tail.len()..].copy_from_slice(&tail);
    Some(Ipv4Addr::from(octets))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
