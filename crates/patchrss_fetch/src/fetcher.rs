use std::error::Error as StdError;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use patchrss_core::{FetchConfig, NetworkPolicy, PatchError};
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::{Attempt, Policy as RedirectPolicy};
use reqwest::Client;

use crate::guard::{literal_ip, ValidatedUrl};
use crate::policy;
use crate::resolver::{AddressBlocked, GuardedResolver};

/// What the fetcher hands back for a 2xx upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Upstream HTTP client. One per process; cheap to share behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: NetworkPolicy,
    max_body_bytes: usize,
}

impl Fetcher {
    pub fn new(config: &FetchConfig, user_agent: &str) -> Result<Self, PatchError> {
        let policy = config.network_policy;
        let max_redirects = config.max_redirects;

        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(config.timeout())
            .redirect(RedirectPolicy::custom(move |attempt| {
                check_redirect(attempt, max_redirects, policy)
            }))
            .dns_resolver(Arc::new(GuardedResolver::new(policy)))
            // A proxy would resolve hostnames on our behalf and bypass the resolver.
            .no_proxy()
            .build()
            .map_err(|e| PatchError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            policy,
            max_body_bytes: config.max_body_bytes,
        })
    }

    /// GET the target, following redirects, and read the body under the size cap.
    #[tracing::instrument(skip(self, target), fields(url = %target.as_str()))]
    pub async fn fetch(&self, target: &ValidatedUrl) -> Result<UpstreamResponse, PatchError> {
        // IP literals never reach the resolver, so check them here.
        if let Some(ip) = target.literal_ip() {
            if let Some(reason) = policy::blocked_reason(ip, self.policy) {
                tracing::warn!(%ip, reason, "Blocked literal upstream address");
                return Err(PatchError::BlockedByPolicy(format!("{}: {}", ip, reason)));
            }
        }

        let response = self
            .client
            .get(target.as_str())
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        tracing::debug!(status = status.as_u16(), final_url = %response.url(), "Upstream responded");

        if !status.is_success() {
            return Err(PatchError::UpstreamStatus {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if let Some(len) = response.content_length() {
            if len > self.max_body_bytes as u64 {
                return Err(PatchError::UpstreamTooLarge {
                    limit: self.max_body_bytes,
                });
            }
        }

        let mut body = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(classify)?;
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(PatchError::UpstreamTooLarge {
                    limit: self.max_body_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(UpstreamResponse {
            status: status.as_u16(),
            content_type,
            body: body.freeze(),
        })
    }
}

fn check_redirect(attempt: Attempt, max_redirects: usize, policy: NetworkPolicy) -> reqwest::redirect::Action {
    if attempt.previous().len() > max_redirects {
        return attempt.error(format!("too many redirects (max {})", max_redirects));
    }
    if let Some(ip) = literal_ip(attempt.url()) {
        if let Some(reason) = policy::blocked_reason(ip, policy) {
            let host = ip.to_string();
            return attempt.error(AddressBlocked { host, reason });
        }
    }
    attempt.follow()
}

/// Map a reqwest failure onto the error taxonomy.
fn classify(err: reqwest::Error) -> PatchError {
    if let Some(blocked) = find_blocked(&err) {
        tracing::warn!(%blocked, "Upstream blocked by network policy");
        return PatchError::BlockedByPolicy(blocked.to_string());
    }
    if err.is_timeout() {
        return PatchError::UpstreamTimeout;
    }
    tracing::warn!(error = ?err, "Upstream transport error");
    PatchError::Transport(err.to_string())
}

fn find_blocked<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a AddressBlocked> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(blocked) = e.downcast_ref::<AddressBlocked>() {
            return Some(blocked);
        }
        current = e.source();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_blocked_walks_source_chain() {
        #[derive(Debug, thiserror::Error)]
        #[error("connect failed")]
        struct Wrapper(#[source] AddressBlocked);

        let err = Wrapper(AddressBlocked {
            host: "internal.example".into(),
            reason: "private address (10.0.0.0/8)",
        });
        let found = find_blocked(&err).expect("blocked error in chain");
        assert_eq!(found.host, "internal.example");
    }

    #[test]
    fn test_find_blocked_ignores_unrelated_errors() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "reset");
        assert!(find_blocked(&err).is_none());
    }

    #[test]
    fn test_builds_with_defaults() {
        let fetcher = Fetcher::new(&FetchConfig::default(), "patchrss (+test)").unwrap();
        assert_eq!(fetcher.policy, NetworkPolicy::PublicOnly);
        assert_eq!(fetcher.max_body_bytes, 10 * 1024 * 1024);
    }
}
