//! `lldpctl -f json` neighbor parsing.
//!
//! lldpd emits several shapes depending on version and neighbor count:
//! `interface` may be an object keyed by interface name or a list of
//! single-entry objects, and `chassis` may carry `id`/`name` directly or be
//! nested one level under the chassis name.

use serde_json::{Map, Value};

/// The command run on each host to dump its LLDP neighbors.
pub const LLDPCTL_COMMAND: &str = "lldpctl -f json";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LldpNeighbor {
    pub local_interface: String,
    pub chassis_name: String,
    /// Lowercase; empty unless the chassis id is of type `mac`.
    pub chassis_mac: String,
    pub port_name: String,
}

/// True when `raw` is well-formed JSON worth persisting.
pub fn is_valid_payload(raw: &str) -> bool {
    !raw.trim().is_empty() && serde_json::from_str::<Value>(raw).is_ok()
}

pub fn parse_neighbors(data: &Value) -> Vec<LldpNeighbor> {
    let Some(interfaces) = data.get("lldp").and_then(|lldp| lldp.get("interface")) else {
        return Vec::new();
    };

    interface_items(interfaces)
        .into_iter()
        .filter_map(|(name, iface)| {
            let iface = iface.as_object()?;
            let (chassis_name, chassis_mac) = iface
                .get("chassis")
                .and_then(Value::as_object)
                .map(parse_chassis)
                .unwrap_or_default();
            let port_name = iface
                .get("port")
                .and_then(Value::as_object)
                .map(parse_port)
                .unwrap_or_default();
            Some(LldpNeighbor {
                local_interface: name.to_string(),
                chassis_name,
                chassis_mac,
                port_name,
            })
        })
        .collect()
}

fn interface_items(interfaces: &Value) -> Vec<(&str, &Value)> {
    match interfaces {
        Value::Object(map) => map.iter().map(|(k, v)| (k.as_str(), v)).collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_object)
            .flat_map(|item| item.iter().map(|(k, v)| (k.as_str(), v)))
            .collect(),
        _ => Vec::new(),
    }
}

/// Returns `(name, mac)`.
fn parse_chassis(chassis: &Map<String, Value>) -> (String, String) {
    if chassis.contains_key("id") {
        let name = str_field(chassis, "name").unwrap_or_default();
        return (name.to_string(), chassis_mac(chassis));
    }

    // Nested: {"switch-1": {"id": {...}, ...}}. Only the first entry counts.
    for (key, nested) in chassis {
        if let Some(nested) = nested.as_object() {
            let name = str_field(nested, "name").unwrap_or(key);
            return (name.to_string(), chassis_mac(nested));
        }
    }
    (String::new(), String::new())
}

fn chassis_mac(chassis: &Map<String, Value>) -> String {
    let Some(id) = chassis.get("id").and_then(Value::as_object) else {
        return String::new();
    };
    if str_field(id, "type") != Some("mac") {
        return String::new();
    }
    str_field(id, "value").unwrap_or_default().to_lowercase()
}

fn parse_port(port: &Map<String, Value>) -> String {
    let id_value = port
        .get("id")
        .and_then(Value::as_object)
        .and_then(|id| str_field(id, "value"))
        .unwrap_or_default();
    if !id_value.is_empty() {
        return id_value.to_string();
    }
    str_field(port, "descr").unwrap_or_default().to_string()
}

fn str_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}
