use serde::{Deserialize, Serialize};

/// Hostname given to synthetic hops that stand in for an unreachable tail.
pub const UNREACHABLE: &str = "UNREACHABLE";

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracerouteHop {
    pub hop_number: u32,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub rtt_ms: f64,
    #[serde(default)]
    pub is_timeout: bool,
}

impl TracerouteHop {
    pub fn timeout(hop_number: u32) -> Self {
        Self {
            hop_number,
            is_timeout: true,
            ..Default::default()
        }
    }

    pub fn unreachable(hop_number: u32, target: &str) -> Self {
        Self {
            hop_number,
            ip: target.to_string(),
            hostname: UNREACHABLE.to_string(),
            rtt_ms: 0.0,
            is_timeout: true,
        }
    }

    /// A hop that actually answered.
    pub fn is_real(&self) -> bool {
        !self.is_timeout && !self.ip.is_empty()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceroutePath {
    pub target: String,
    #[serde(default)]
    pub hops: Vec<TracerouteHop>,
    #[serde(default)]
    pub completed: bool,
}

impl TraceroutePath {
    pub fn empty(target: &str) -> Self {
        Self {
            target: target.to_string(),
            ..Default::default()
        }
    }

    pub fn real_hops(&self) -> impl Iterator<Item = &TracerouteHop> {
        self.hops.iter().filter(|h| h.is_real())
    }
}
