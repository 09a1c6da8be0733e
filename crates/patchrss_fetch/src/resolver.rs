//! DNS resolver that drops addresses the network policy forbids.
//!
//! Plugged into reqwest so the check happens on the addresses actually
//! connected to, not on the hostname string.

use std::error::Error as StdError;
use std::net::SocketAddr;

use hyper::client::connect::dns::Name;
use patchrss_core::NetworkPolicy;
use reqwest::dns::{Addrs, Resolve, Resolving};
use thiserror::Error;

use crate::policy;

/// Every address a host resolved to was rejected by the policy.
#[derive(Debug, Error)]
#[error("{host} blocked by network policy: {reason}")]
pub struct AddressBlocked {
    pub host: String,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct GuardedResolver {
    policy: NetworkPolicy,
}

impl GuardedResolver {
    pub fn new(policy: NetworkPolicy) -> Self {
        Self { policy }
    }
}

impl Resolve for GuardedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let policy = self.policy;
        let host = name.as_str().to_string();
        Box::pin(async move {
            let resolved: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
                .await?
                .collect();
            let allowed = filter_addrs(&host, resolved, policy)?;
            let addrs: Addrs = Box::new(allowed.into_iter());
            Ok::<_, Box<dyn StdError + Send + Sync>>(addrs)
        })
    }
}

/// Keep the addresses `policy` permits; fail if none survive.
pub(crate) fn filter_addrs(
    host: &str,
    resolved: Vec<SocketAddr>,
    policy: NetworkPolicy,
) -> Result<Vec<SocketAddr>, Box<dyn StdError + Send + Sync>> {
    if resolved.is_empty() {
        return Err(format!("no addresses found for {}", host).into());
    }

    let mut first_reason = None;
    let allowed: Vec<SocketAddr> = resolved
        .into_iter()
        .filter(|addr| match policy::blocked_reason(addr.ip(), policy) {
            Some(reason) => {
                tracing::debug!(host, ip = %addr.ip(), reason, "Dropping resolved address");
                first_reason.get_or_insert(reason);
                false
            }
            None => true,
        })
        .collect();

    if allowed.is_empty() {
        return Err(Box::new(AddressBlocked {
            host: host.to_string(),
            reason: first_reason.unwrap_or("address not permitted"),
        }));
    }
    Ok(allowed)
}
