use pnet::util::MacAddr;

/// Lowercase, colon-separated form used as the key everywhere MACs are compared.
pub fn normalize_mac(mac: &str) -> String {
    mac.trim().replace('-', ":").to_ascii_lowercase()
}

pub fn mac_to_string(mac: MacAddr) -> String {
    // MacAddr's Display already renders lowercase hex with colons.
    mac.to_string()
}

/// `AA:BB:CC` prefix used for OUI lookups, or `None` if the MAC is too short.
pub fn oui_prefix(mac: &str) -> Option<String> {
    let normalized = normalize_mac(mac).to_ascii_uppercase();
    let prefix = normalized.get(..8)?;
    let valid = prefix
        .split(':')
        .all(|octet| octet.len() == 2 && octet.chars().all(|c| c.is_ascii_hexdigit()));
    valid.then(|| prefix.to_string())
}

/// Formats six SNMP index components as a MAC string.
pub fn mac_from_octets(octets: &[u64]) -> Option<String> {
    if octets.len() != 6 || octets.iter().any(|o| *o > 0xff) {
        return None;
    }
    Some(
        octets
            .iter()
            .map(|o| format!("{o:02x}"))
            .collect::<Vec<_>>()
            .join(":"),
    )
}
