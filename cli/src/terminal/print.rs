use std::fmt::Display;
use std::time::Duration;

use colored::*;
use lanscope_common::network::topology::NetworkTopology;
use tracing::info;
use unicode_width::UnicodeWidthStr;

use super::logging::PRINT_TARGET;

pub const TOTAL_WIDTH: usize = 64;
const KEY_WIDTH: usize = 14;

const SEPARATOR: Color = Color::BrightBlack;
const PRIMARY: Color = Color::BrightGreen;
const TEXT_DEFAULT: Color = Color::White;

pub fn print(msg: &str) {
    info!(target: PRINT_TARGET, "{msg}");
}

pub fn header(msg: &str) {
    let formatted: String = format!("⟦ {} ⟧", msg.to_uppercase());
    let dash_count: usize = TOTAL_WIDTH.saturating_sub(UnicodeWidthStr::width(formatted.as_str()));
    let left: usize = dash_count / 2;
    let right: usize = dash_count - left;

    print(&format!(
        "{}{}{}",
        "─".repeat(left).color(SEPARATOR),
        formatted.bright_green(),
        "─".repeat(right).color(SEPARATOR)
    ));
}

pub fn fat_separator() {
    print(&"═".repeat(TOTAL_WIDTH).color(SEPARATOR).to_string());
}

pub fn aligned_line<V: Display>(key: &str, value: V) {
    let dots: String = ".".repeat((KEY_WIDTH + 1).saturating_sub(key.len()));
    print(&format!(
        "{} {}{}{} {}",
        ">".color(SEPARATOR),
        key.color(PRIMARY),
        dots.color(SEPARATOR),
        ":".color(SEPARATOR),
        value.to_string().color(TEXT_DEFAULT)
    ));
}

pub fn summary(topology: &NetworkTopology, elapsed: Duration) {
    header("discovery complete");

    let iface = &topology.local_interface;
    aligned_line("Interface", format!("{} ({}/{})", iface.name, iface.ip, iface.netmask));
    if let Some(gateway) = &topology.gateway {
        aligned_line("Gateway", &gateway.ip);
    }
    aligned_line("Subnets", topology.subnets.len());
    aligned_line("Hosts", topology.local_hosts.len());
    aligned_line(
        "Infrastructure",
        topology.local_hosts.iter().filter(|h| h.is_infrastructure).count(),
    );
    aligned_line("L2 edges", topology.l2_topology.len());
    aligned_line("Tree edges", topology.topology_tree.len());
    if !topology.traceroute_paths.is_empty() {
        let completed = topology.traceroute_paths.iter().filter(|p| p.completed).count();
        aligned_line(
            "Traces",
            format!("{completed}/{} completed", topology.traceroute_paths.len()),
        );
    }
    aligned_line("Elapsed", format!("{:.2}s", elapsed.as_secs_f64()));

    fat_separator();
}
