//! Route tracing with `tracepath`/`traceroute` and the hop-derived parent map
//! used when no switch-side data is available.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use lanscope_common::network::host::DiscoveredHost;
use lanscope_common::network::topology::TopologyTree;
use lanscope_common::network::trace::TraceroutePath;
use lanscope_protocols::trace::{TraceTool, cleanup_trace};

use crate::dns::ReverseDns;
use crate::system::CommandRunner;

const LOCAL_POOL: usize = 20;
const LOCAL_MAX_HOPS: u32 = 5;
const LOCAL_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct TraceProbe {
    runner: Arc<dyn CommandRunner>,
    dns: Arc<dyn ReverseDns>,
    max_hops: u32,
    tool: Arc<OnceLock<Option<TraceTool>>>,
}

impl TraceProbe {
    pub fn new(runner: Arc<dyn CommandRunner>, dns: Arc<dyn ReverseDns>, max_hops: u32) -> Self {
        Self {
            runner,
            dns,
            max_hops,
            tool: Arc::new(OnceLock::new()),
        }
    }

    /// The trace tool found on `PATH`, detected on first use.
    pub fn tool(&self) -> Option<TraceTool> {
        *self.tool.get_or_init(|| {
            let found = TraceTool::PREFERENCE
                .into_iter()
                .find(|tool| self.runner.has_program(tool.program()));
            match found {
                Some(tool) => info!("Using {} for route tracing", tool.program()),
                None => warn!("Neither tracepath nor traceroute found in PATH"),
            }
            found
        })
    }

    /// Traces one target. Without a tool or output the path is empty;
    /// otherwise incomplete paths are collapsed by [`cleanup_trace`].
    pub async fn run_trace(&self, target: &str, max_hops: u32, timeout: Duration) -> TraceroutePath {
        let Some(tool) = self.tool() else {
            return TraceroutePath::empty(target);
        };
        debug!(
            "Running {} to {target} (max_hops={max_hops}, timeout={}s)...",
            tool.program(),
            timeout.as_secs()
        );

        let args = tool.args(target, max_hops);
        let argv: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self
            .runner
            .output(tool.program(), &argv, timeout)
            .await
            .unwrap_or_default();
        if output.trim().is_empty() {
            return TraceroutePath::empty(target);
        }

        let target_ip = self
            .dns
            .resolve(target)
            .await
            .unwrap_or_else(|| target.to_string());
        let mut path = tool.parse(target, &target_ip, &output);
        for hop in path.hops.iter_mut().filter(|h| h.is_real()) {
            hop.hostname = self.dns.reverse(&hop.ip).await;
        }
        cleanup_trace(path)
    }

    /// Traces each explicit target with the full hop budget. Hostnames that
    /// do not resolve are skipped.
    pub async fn traceroute_targets(&self, targets: &[String]) -> Vec<TraceroutePath> {
        let timeout = Duration::from_secs(u64::from(self.max_hops) * 3 + 10);
        let mut paths = Vec::with_capacity(targets.len());
        for target in targets {
            if target.parse::<Ipv4Addr>().is_err() && self.dns.resolve(target).await.is_none() {
                warn!("Cannot resolve target: {target}");
                continue;
            }
            paths.push(self.run_trace(target, self.max_hops, timeout).await);
        }
        paths
    }

    /// Short traces to every non-gateway host other than `local_ip`, run in
    /// parallel. Results keep the order of `hosts`.
    pub async fn trace_local_hosts(&self, hosts: &[DiscoveredHost], local_ip: &str) -> Vec<TraceroutePath> {
        let targets: Vec<String> = hosts
            .iter()
            .filter(|h| !h.is_gateway && h.ip != local_ip)
            .map(|h| h.ip.clone())
            .collect();
        if targets.is_empty() {
            return Vec::new();
        }

        let total = targets.len();
        info!(
            "Running tracepath to {total} local hosts ({LOCAL_POOL} parallel, {}s timeout)...",
            LOCAL_TIMEOUT.as_secs()
        );
        self.tool();

        let permits = Arc::new(Semaphore::new(LOCAL_POOL));
        let mut set = JoinSet::new();
        for (order, ip) in targets.into_iter().enumerate() {
            let probe = self.clone();
            let permits = Arc::clone(&permits);
            set.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let path = probe.run_trace(&ip, LOCAL_MAX_HOPS, LOCAL_TIMEOUT).await;
                (order, ip, path)
            });
        }

        let mut done = 0;
        let mut paths = Vec::with_capacity(total);
        while let Some(joined) = set.join_next().await {
            done += 1;
            match joined {
                Ok((order, ip, path)) => {
                    info!("  [{done}/{total}] {ip}: {} hop(s)", path.real_hops().count());
                    paths.push((order, path));
                }
                Err(e) => debug!("Tracepath task failed: {e}"),
            }
        }
        info!("Completed tracepath to {}/{total} hosts", paths.len());

        paths.sort_by_key(|(order, _)| *order);
        paths.into_iter().map(|(_, path)| path).collect()
    }
}

/// Parent map from traced paths.
///
/// Zero or one answering hop attaches the target to the gateway; longer
/// paths attach it to the penultimate hop. Known hosts seen strictly between
/// the first and last hop are flagged infrastructure, except the gateway.
pub fn build_topology_tree(
    hosts: &mut [DiscoveredHost],
    paths: &[TraceroutePath],
    gateway_ip: &str,
) -> TopologyTree {
    let mut tree = TopologyTree::new();
    let mut infrastructure: HashSet<String> = HashSet::new();

    for path in paths {
        let real: Vec<&str> = path.real_hops().map(|h| h.ip.as_str()).collect();
        let parent = match real.len() {
            0 | 1 => gateway_ip,
            n => {
                infrastructure.extend(real[1..n - 1].iter().map(|ip| ip.to_string()));
                real[n - 2]
            }
        };
        if parent != path.target {
            tree.insert(path.target.clone(), parent.to_string());
        }
    }

    for host in hosts.iter_mut() {
        if host.ip != gateway_ip && infrastructure.contains(&host.ip) {
            host.is_infrastructure = true;
        }
    }
    tree
}
