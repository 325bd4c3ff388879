//! Local host enrichment

use async_trait::async_trait;
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::OnceLock;
use tlstap_core::{Address, AddressEnricher};
use tracing::debug;

struct HostSnapshot {
    hostname: String,
    local_ips: HashSet<Ipv4Addr>,
}

static HOST_SNAPSHOT: OnceLock<HostSnapshot> = OnceLock::new();

/// Names addresses that belong to this machine with its hostname.
///
/// The hostname and the interface address list are snapshotted once per
/// process; addresses added after startup are not recognized.
pub struct LocalHostEnricher {
    hostname: String,
    local_ips: HashSet<Ipv4Addr>,
}

impl LocalHostEnricher {
    pub fn new() -> Self {
        let snapshot = HOST_SNAPSHOT.get_or_init(|| {
            let hostname = hostname::get()
                .map(|h: std::ffi::OsString| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| "unknown".to_string());
            let local_ips = local_ipv4_addrs();
            debug!(hostname, addrs = local_ips.len(), "host snapshot taken");
            HostSnapshot {
                hostname,
                local_ips,
            }
        });

        Self {
            hostname: snapshot.hostname.clone(),
            local_ips: snapshot.local_ips.clone(),
        }
    }

    #[cfg(test)]
    fn from_parts(hostname: &str, local_ips: impl IntoIterator<Item = Ipv4Addr>) -> Self {
        Self {
            hostname: hostname.to_string(),
            local_ips: local_ips.into_iter().collect(),
        }
    }
}

impl Default for LocalHostEnricher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AddressEnricher for LocalHostEnricher {
    fn name(&self) -> &str {
        "local-host"
    }

    async fn enrich(&self, addr: &mut Address) {
        if addr.name.is_some() {
            return;
        }
        let Ok(ip) = addr.ip.parse::<Ipv4Addr>() else {
            return;
        };
        if self.local_ips.contains(&ip) {
            addr.name = Some(self.hostname.clone());
        }
    }
}

#[cfg(target_os = "linux")]
fn local_ipv4_addrs() -> HashSet<Ipv4Addr> {
    let Ok(addrs) = nix::ifaddrs::getifaddrs() else {
        return HashSet::new();
    };
    addrs
        .filter_map(|ifaddr| ifaddr.address)
        .filter_map(|addr| addr.as_sockaddr_in().map(|sin| sin.ip()))
        .collect()
}

#[cfg(not(target_os = "linux"))]
fn local_ipv4_addrs() -> HashSet<Ipv4Addr> {
    HashSet::new()
}
