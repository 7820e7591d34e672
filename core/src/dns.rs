//! Reverse and forward name lookups through the system resolver.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use dns_lookup::{lookup_addr, lookup_host};
use tracing::debug;

/// Upper bound for a single resolver call.
const DNS_TIMEOUT: Duration = Duration::from_secs(2);

#[async_trait]
pub trait ReverseDns: Send + Sync {
    /// PTR name for `ip`, or an empty string on any failure.
    async fn reverse(&self, ip: &str) -> String;

    /// First IPv4 address for `name`. Literal IPv4 addresses resolve to themselves.
    async fn resolve(&self, name: &str) -> Option<String>;
}

pub struct SystemDns;

#[async_trait]
impl ReverseDns for SystemDns {
    async fn reverse(&self, ip: &str) -> String {
        let Ok(addr) = ip.parse::<IpAddr>() else {
            return String::new();
        };
        let lookup = tokio::task::spawn_blocking(move || lookup_addr(&addr));
        match tokio::time::timeout(DNS_TIMEOUT, lookup).await {
            // The resolver echoes the address back when there is no PTR record.
            Ok(Ok(Ok(name))) if name != ip => name,
            Ok(Ok(Err(e))) => {
                debug!("Reverse lookup for {ip} failed: {e}");
                String::new()
            }
            _ => String::new(),
        }
    }

    async fn resolve(&self, name: &str) -> Option<String> {
        if let Ok(IpAddr::V4(v4)) = name.parse::<IpAddr>() {
            return Some(v4.to_string());
        }
        let host = name.to_string();
        let lookup = tokio::task::spawn_blocking(move || lookup_host(&host));
        match tokio::time::timeout(DNS_TIMEOUT, lookup).await {
            Ok(Ok(Ok(addrs))) => addrs
                .into_iter()
                .find(IpAddr::is_ipv4)
                .map(|addr| addr.to_string()),
            _ => {
                debug!("Cannot resolve {name}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn literal_addresses_resolve_to_themselves() {
        assert_eq!(SystemDns.resolve("10.0.0.5").await.as_deref(), Some("10.0.0.5"));
    }

    #[tokio::test]
    async fn garbage_reverse_lookup_is_empty() {
        assert_eq!(SystemDns.reverse("not-an-ip").await, "");
    }
}
