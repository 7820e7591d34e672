use std::collections::HashMap;

use crate::network::mac::oui_prefix;

pub trait VendorRepository: Send + Sync {
    /// Vendor name for a MAC address, if its OUI is known.
    fn get_vendor(&self, mac: &str) -> Option<String>;
}

/// Exact-prefix vendor table parsed from the IEEE `oui.txt` listing.
#[derive(Debug, Default, Clone)]
pub struct OuiDatabase {
    entries: HashMap<String, String>,
}

impl OuiDatabase {
    /// Parses lines of the form `AA-BB-CC   (hex)\t\tVendor Name`.
    /// Every other line is ignored.
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .filter(|line| line.contains("(hex)"))
            .filter_map(|line| {
                let (prefix, vendor) = line.split_once("(hex)")?;
                let prefix = prefix.trim().replace('-', ":").to_ascii_uppercase();
                let vendor = vendor.trim();
                (prefix.len() == 8 && !vendor.is_empty()).then(|| (prefix, vendor.to_string()))
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl VendorRepository for OuiDatabase {
    fn get_vendor(&self, mac: &str) -> Option<String> {
        let prefix = oui_prefix(mac)?;
        self.entries.get(&prefix).cloned()
    }
}

/// Used when no vendor source could be loaded.
pub struct NoVendors;

impl VendorRepository for NoVendors {
    fn get_vendor(&self, _mac: &str) -> Option<String> {
        None
    }
}
