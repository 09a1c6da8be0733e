use std::net::IpAddr;

use patchrss_core::PatchError;
use url::{Host, Url};

/// A client-supplied target that passed [`validate`].
#[derive(Debug, Clone)]
pub struct ValidatedUrl {
    raw: String,
    url: Url,
}

impl ValidatedUrl {
    /// The query-string value exactly as the client sent it.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Normalized serialization, used for fetching and link derivation.
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// `host[:port]`, default port elided.
    pub fn authority(&self) -> String {
        authority_of(&self.url)
    }

    /// The target's address when the host is an IP literal.
    pub fn literal_ip(&self) -> Option<IpAddr> {
        literal_ip(&self.url)
    }
}

/// Validate the `url` query parameter.
///
/// Checks, in order: presence, absolute-URL syntax, http(s) scheme, and that
/// the authority is not this service's own (`self_host`). Resolved-address
/// policy is enforced later, at connect time.
pub fn validate(raw: Option<&str>, self_host: &str) -> Result<ValidatedUrl, PatchError> {
    let raw = match raw {
        Some(r) if !r.is_empty() => r,
        _ => return Err(PatchError::MissingParam),
    };

    let url = Url::parse(raw).map_err(|_| PatchError::InvalidUrl(raw.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(PatchError::BadScheme);
    }

    if authority_of(&url).eq_ignore_ascii_case(self_host) {
        return Err(PatchError::LoopDetected);
    }

    Ok(ValidatedUrl {
        raw: raw.to_string(),
        url,
    })
}

pub(crate) fn authority_of(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

pub(crate) fn literal_ip(url: &Url) -> Option<IpAddr> {
    match url.host()? {
        Host::Ipv4(v4) => Some(IpAddr::V4(v4)),
        Host::Ipv6(v6) => Some(IpAddr::V6(v6)),
        Host::Domain(_) => None,
    }
}
