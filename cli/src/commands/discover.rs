use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use lanscope_common::config::DiscoveryConfig;
use lanscope_common::network::topology::NetworkTopology;
use lanscope_core::topology;
use tracing::{Instrument, info};

use crate::terminal::{print, spinner};

pub async fn discover(config: DiscoveryConfig, output: Option<PathBuf>) -> anyhow::Result<()> {
    let span = spinner::discovery_span("Discovering network topology...");

    let start_time = Instant::now();
    let topology = topology::run_discovery(config).instrument(span).await?;
    print::summary(&topology, start_time.elapsed());

    emit(&topology, output.as_deref()).await
}

/// Pretty JSON to `output`, or to stdout when no file is given.
async fn emit(topology: &NetworkTopology, output: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(topology).context("serializing topology")?;
    match output {
        Some(path) => {
            tokio::fs::write(path, format!("{json}\n"))
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!("Output written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
