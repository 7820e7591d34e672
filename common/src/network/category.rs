//! Ordered vendor/hostname rules that sort hosts into a [`DeviceCategory`].
//!
//! Rules are checked top to bottom. Within a rule the vendor substrings are
//! tried before the hostname substrings, and the first hit wins.

use super::host::{DeviceCategory, DiscoveredHost};

type Rule = (DeviceCategory, &'static [&'static str], &'static [&'static str]);

static CATEGORY_RULES: &[Rule] = &[
    (
        DeviceCategory::Infrastructure,
        &["NETGEAR", "Netgear", "Ubiquiti", "TP-LINK", "TP-Link", "Cisco"],
        &["switch", "gs108", "gs305", "efh24", "gs116"],
    ),
    (
        DeviceCategory::Server,
        &["Raspberry Pi", "Super Micro", "Supermicro", "UGREEN", "Ugreen"],
        &[
            "node",
            "nas",
            "supermicro",
            "rpi",
            "raspi",
            "thinkcentre",
            "acerrevo",
            "revo",
            "peekabooboo",
        ],
    ),
    (
        DeviceCategory::Iot,
        &[
            "Espressif",
            "BroadLink",
            "Hangzhou BroadLink",
            "Nuki",
            "Climax",
            "Ogemray",
            "Shenzhen Ogemray",
        ],
        &["tasmota", "nous", "shelly", "plug", "sensor"],
    ),
    (
        DeviceCategory::Phone,
        &["Grandstream", "snom"],
        &["wp820", "gxp", "phone", "sip"],
    ),
    (
        DeviceCategory::Media,
        &[
            "Google, Inc.",
            "Google",
            "NVIDIA",
            "Samsung",
            "HUMAX",
            "Slim Devices",
            "Denon",
            "D&M Holdings",
            "StreamUnlimited",
        ],
        &["chromecast", "shield", "tv", "denon", "humax", "squeezebox"],
    ),
    (
        DeviceCategory::HomeAutomation,
        &[
            "Philips Lighting",
            "Nabu Casa",
            "Weinzierl",
            "Fa. GIRA",
            "GIRA",
            "iRobot",
        ],
        &["hue", "homeassistant", "home-assistant", "knx", "roomba"],
    ),
    (
        DeviceCategory::Computer,
        &[
            "HP Inc.",
            "Hewlett Packard",
            "HP",
            "Brother",
            "Intel",
            "Part II Research",
            "Realtek",
            "REALTEK",
        ],
        &["printer", "brother", "laptop"],
    ),
];

/// Classifies a host purely from its vendor and hostname strings.
pub fn categorize(host: &DiscoveredHost) -> DeviceCategory {
    categorize_parts(&host.vendor, &host.hostname)
}

pub fn categorize_parts(vendor: &str, hostname: &str) -> DeviceCategory {
    let vendor = vendor.to_lowercase();
    let hostname = hostname.to_lowercase();

    for (category, vendor_patterns, hostname_patterns) in CATEGORY_RULES {
        if vendor_patterns
            .iter()
            .any(|pattern| vendor.contains(&pattern.to_lowercase()))
        {
            return *category;
        }
        if hostname_patterns
            .iter()
            .any(|pattern| hostname.contains(pattern))
        {
            return *category;
        }
    }

    DeviceCategory::Other
}
