use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use mac_oui::Oui;
use tracing::{debug, info, warn};

use lanscope_common::vendors::{NoVendors, OuiDatabase, VendorRepository};

pub const OUI_URL: &str = "https://standards-oui.ieee.org/oui/oui.txt";

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Vendor lookups backed by the database compiled into `mac_oui`.
pub struct MacOuiRepo {
    db: Oui,
}

impl MacOuiRepo {
    pub fn load() -> anyhow::Result<Self> {
        let db = Oui::default().map_err(|e| anyhow::anyhow!("loading embedded OUI database: {e}"))?;
        Ok(Self { db })
    }
}

impl VendorRepository for MacOuiRepo {
    fn get_vendor(&self, mac: &str) -> Option<String> {
        match self.db.lookup_by_mac(mac) {
            Ok(Some(entry)) => Some(entry.company_name.clone()),
            _ => None,
        }
    }
}

/// Picks the best available vendor source: the IEEE listing cached at
/// `cache_path` (downloaded on first use), then the embedded database, then
/// nothing at all.
pub async fn load_vendor_repository(cache_path: &Path) -> Arc<dyn VendorRepository> {
    if !cache_path.exists() {
        info!("Downloading OUI database...");
        if let Err(e) = download_oui(cache_path).await {
            warn!("Could not download OUI database: {e:#}");
        }
    }

    match tokio::fs::read_to_string(cache_path).await {
        Ok(text) => {
            let db = OuiDatabase::parse(&text);
            if !db.is_empty() {
                debug!("Loaded {} OUI prefixes from {}", db.len(), cache_path.display());
                return Arc::new(db);
            }
            warn!("OUI cache {} holds no usable entries", cache_path.display());
        }
        Err(e) => debug!("Could not read OUI cache {}: {e}", cache_path.display()),
    }

    match MacOuiRepo::load() {
        Ok(repo) => {
            info!("Using embedded OUI database");
            Arc::new(repo)
        }
        Err(e) => {
            warn!("No vendor database available: {e:#}");
            Arc::new(NoVendors)
        }
    }
}

async fn download_oui(cache_path: &Path) -> anyhow::Result<()> {
    let client = reqwest::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .context("building HTTP client")?;
    let body = client
        .get(OUI_URL)
        .send()
        .await
        .context("requesting oui.txt")?
        .error_for_status()
        .context("oui.txt download rejected")?
        .text()
        .await
        .context("reading oui.txt body")?;
    tokio::fs::write(cache_path, body)
        .await
        .with_context(|| format!("writing {}", cache_path.display()))?;
    Ok(())
}
