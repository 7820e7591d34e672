use once_cell::sync::Lazy;
use regex::Regex;

static OPEN_PORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+/\w+)\s+open\s+(\S+)\s*(.*)").expect("invalid regex"));

/// What one line of streamed `nmap` output means to us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NmapLine {
    /// Status output worth surfacing live (`Stats:`, `% done`, report headers).
    Progress(String),
    /// An open port, rendered as `port/proto service (version)`.
    Service(String),
    Other,
}

pub fn service_scan_args(ip: &str, top_ports: u32) -> Vec<String> {
    vec![
        "-sV".into(),
        "--top-ports".into(),
        top_ports.to_string(),
        "-T4".into(),
        "--open".into(),
        "--stats-every".into(),
        "5s".into(),
        ip.into(),
    ]
}

pub fn classify_line(line: &str) -> NmapLine {
    if let Some(caps) = OPEN_PORT.captures(line) {
        let version = caps[3].trim();
        let mut entry = format!("{} {}", &caps[1], &caps[2]);
        if !version.is_empty() {
            entry.push_str(&format!(" ({version})"));
        }
        return NmapLine::Service(entry);
    }

    let is_progress = line.contains("Stats:")
        || line.contains("Timing:")
        || line.contains("% done")
        || line.starts_with("Nmap scan report")
        || line.starts_with("Nmap done");
    if is_progress {
        NmapLine::Progress(line.trim().to_string())
    } else {
        NmapLine::Other
    }
}
