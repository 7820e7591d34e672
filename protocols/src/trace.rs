//! `tracepath -n` and `traceroute -n` output parsing.
//!
//! Hop hostnames are left empty here; reverse lookups happen in the engine.

use once_cell::sync::Lazy;
use regex::Regex;

use lanscope_common::network::trace::{TracerouteHop, TraceroutePath};

static TRACEPATH_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\??:\s+(.+)").expect("invalid regex"));
static TRACEPATH_HOP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\S+)\s+([\d.]+)ms").expect("invalid regex"));
static TRACEROUTE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\s+(.+)").expect("invalid regex"));
static TRACEROUTE_HOP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\S+)\s+(.+)").expect("invalid regex"));
static RTT_MS: Lazy<Regex> = Lazy::new(|| Regex::new(r"([\d.]+)\s*ms").expect("invalid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceTool {
    Tracepath,
    Traceroute,
}

impl TraceTool {
    /// Preference order when probing `PATH`.
    pub const PREFERENCE: [TraceTool; 2] = [TraceTool::Tracepath, TraceTool::Traceroute];

    pub fn program(&self) -> &'static str {
        match self {
            TraceTool::Tracepath => "tracepath",
            TraceTool::Traceroute => "traceroute",
        }
    }

    pub fn args(&self, target: &str, max_hops: u32) -> Vec<String> {
        let hops = max_hops.to_string();
        match self {
            TraceTool::Tracepath => vec!["-n".into(), "-m".into(), hops, target.into()],
            TraceTool::Traceroute => vec![
                "-n".into(),
                "-m".into(),
                hops,
                "-w".into(),
                "2".into(),
                target.into(),
            ],
        }
    }

    /// `target_ip` is the resolved address of `target` (or `target` itself
    /// when resolution failed); a hop equal to it completes the path.
    pub fn parse(&self, target: &str, target_ip: &str, output: &str) -> TraceroutePath {
        match self {
            TraceTool::Tracepath => parse_tracepath(target, target_ip, output),
            TraceTool::Traceroute => parse_traceroute(target, target_ip, output),
        }
    }
}

pub fn parse_tracepath(target: &str, target_ip: &str, output: &str) -> TraceroutePath {
    let mut hops: Vec<TracerouteHop> = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for line in output.lines() {
        let Some(caps) = TRACEPATH_LINE.captures(line) else {
            continue;
        };
        let Ok(hop_number) = caps[1].parse::<u32>() else {
            continue;
        };
        let rest = caps[2].trim();

        if rest.contains("[LOCALHOST]") || rest.starts_with("Resume:") || rest.contains("Too many hops") {
            continue;
        }
        // tracepath re-probes hops; only the first line per hop counts.
        if !seen.insert(hop_number) {
            continue;
        }

        if rest.starts_with("no reply") {
            hops.push(TracerouteHop::timeout(hop_number));
            continue;
        }

        if let Some(hop) = TRACEPATH_HOP.captures(rest) {
            let ip = hop[1].to_string();
            let rtt_ms = hop[2].parse::<f64>().unwrap_or(0.0);
            hops.push(TracerouteHop {
                hop_number,
                ip,
                hostname: String::new(),
                rtt_ms,
                is_timeout: false,
            });
        }
    }

    finish(target, target_ip, hops)
}

pub fn parse_traceroute(target: &str, target_ip: &str, output: &str) -> TraceroutePath {
    let mut hops: Vec<TracerouteHop> = Vec::new();

    for line in output.lines() {
        let Some(caps) = TRACEROUTE_LINE.captures(line) else {
            continue;
        };
        let Ok(hop_number) = caps[1].parse::<u32>() else {
            continue;
        };
        let rest = caps[2].trim();

        if rest.starts_with("* * *") {
            hops.push(TracerouteHop::timeout(hop_number));
            continue;
        }

        if let Some(hop) = TRACEROUTE_HOP.captures(rest) {
            let ip = hop[1].to_string();
            let rtt_ms = RTT_MS
                .captures(&hop[2])
                .and_then(|rtt| rtt[1].parse::<f64>().ok())
                .unwrap_or(0.0);
            hops.push(TracerouteHop {
                hop_number,
                ip,
                hostname: String::new(),
                rtt_ms,
                is_timeout: false,
            });
        }
    }

    finish(target, target_ip, hops)
}

/// A path completes only when its last answering hop is the target.
fn finish(target: &str, target_ip: &str, hops: Vec<TracerouteHop>) -> TraceroutePath {
    let completed = hops
        .iter()
        .rev()
        .find(|h| h.is_real())
        .is_some_and(|h| h.ip == target_ip);
    TraceroutePath {
        target: target.to_string(),
        hops,
        completed,
    }
}

/// Collapses an incomplete path to its answering hops plus one trailing
/// `UNREACHABLE` marker. Completed paths pass through untouched.
pub fn cleanup_trace(mut path: TraceroutePath) -> TraceroutePath {
    if path.completed {
        return path;
    }

    let mut real: Vec<TracerouteHop> = path.real_hops().cloned().collect();
    let next_hop = match real.last() {
        Some(last) => last.hop_number + 1,
        None => 1,
    };
    real.push(TracerouteHop::unreachable(next_hop, &path.target));
    path.hops = real;
    path
}
