use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::DEFAULT_DOC_URL;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PatchConfig {
    pub server: ServerConfig,
    pub fetch: FetchConfig,
}

impl PatchConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: PatchConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if file doesn't exist, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    /// Apply environment variable overrides on top of file-based config.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Unparseable numeric values are ignored with a warning; the previous
    /// value stays in effect.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| keys.iter().find_map(|&k| lookup(k));

        if let Some(v) = first(&["HOST"]) {
            self.server.host = v;
        }
        if let Some(n) = first(&["PORT"]).and_then(|v| parse_or_warn("PORT", &v)) {
            self.server.port = n;
        }
        if let Some(v) = first(&["SELF_HOST", "PATCHRSS_HOST"]) {
            self.server.self_host = v;
        }
        if let Some(n) = first(&["REQUEST_TIMEOUT_MSEC", "HONO_REQUEST_TIMEOUT_MSEC"])
            .and_then(|v| parse_or_warn("REQUEST_TIMEOUT_MSEC", &v))
        {
            self.server.request_timeout_ms = n;
        }
        if let Some(v) = first(&["DOC_URL"]) {
            self.server.doc_url = v;
        }

        if let Some(n) =
            first(&["FETCH_TIMEOUT_MSEC"]).and_then(|v| parse_or_warn("FETCH_TIMEOUT_MSEC", &v))
        {
            self.fetch.timeout_ms = n;
        }
        if let Some(n) =
            first(&["MAX_BODY_BYTES"]).and_then(|v| parse_or_warn("MAX_BODY_BYTES", &v))
        {
            self.fetch.max_body_bytes = n;
        }
        if let Some(n) = first(&["MAX_REDIRECTS"]).and_then(|v| parse_or_warn("MAX_REDIRECTS", &v))
        {
            self.fetch.max_redirects = n;
        }
        if let Some(v) = first(&["ALLOW_PRIVATE_NETWORKS"]) {
            self.fetch.network_policy = if v == "1" || v.eq_ignore_ascii_case("true") {
                NetworkPolicy::Unrestricted
            } else {
                NetworkPolicy::PublicOnly
            };
        }
    }
}

fn parse_or_warn<T: std::str::FromStr>(key: &str, value: &str) -> Option<T> {
    match value.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not a number", key, value);
            None
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Authority (`host:port`) this service is reachable at. Targets with the
    /// same authority are rejected as self-referencing loops.
    pub self_host: String,
    /// Upper bound on total handling time for one request.
    pub request_timeout_ms: u64,
    /// Where `GET /` redirects to; also linked from the user-agent.
    pub doc_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            self_host: "localhost:3000".to_string(),
            request_timeout_ms: 10_000,
            doc_url: DEFAULT_DOC_URL.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_ms: u64,
    /// Upstream bodies larger than this fail with `UpstreamTooLarge`.
    pub max_body_bytes: usize,
    pub max_redirects: usize,
    pub network_policy: NetworkPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            max_body_bytes: 10 * 1024 * 1024,
            max_redirects: 10,
            network_policy: NetworkPolicy::PublicOnly,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Which resolved addresses the fetcher may connect to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkPolicy {
    /// Only globally routable unicast addresses.
    #[default]
    PublicOnly,
    /// Any address, loopback and private ranges included. Local development only.
    Unrestricted,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn test_default_config() {
        let cfg = PatchConfig::default();
        assert_eq!(cfg.server.port, 3000);
        assert_eq!(cfg.server.self_host, "localhost:3000");
        assert_eq!(cfg.server.request_timeout_ms, 10_000);
        assert_eq!(cfg.fetch.timeout_ms, 5_000);
        assert_eq!(cfg.fetch.network_policy, NetworkPolicy::PublicOnly);
        assert_eq!(cfg.server.doc_url, DEFAULT_DOC_URL);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[server]
port = 8080
"#;
        let cfg: PatchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.server.port, 8080);
        // Defaults for unspecified fields
        assert_eq!(cfg.server.self_host, "localhost:3000");
        assert_eq!(cfg.fetch.max_redirects, 10);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[server]
host = "127.0.0.1"
port = 4000
self_host = "patchrss.example.com"
request_timeout_ms = 2000
doc_url = "https://example.com/docs"

[fetch]
timeout_ms = 1500
max_body_bytes = 1024
max_redirects = 3
network_policy = "unrestricted"
"#;
        let cfg: PatchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.server.bind_addr(), "127.0.0.1:4000");
        assert_eq!(cfg.server.self_host, "patchrss.example.com");
        assert_eq!(cfg.server.request_timeout(), Duration::from_millis(2000));
        assert_eq!(cfg.fetch.timeout(), Duration::from_millis(1500));
        assert_eq!(cfg.fetch.max_body_bytes, 1024);
        assert_eq!(cfg.fetch.max_redirects, 3);
        assert_eq!(cfg.fetch.network_policy, NetworkPolicy::Unrestricted);
    }

    #[test]
    fn test_overrides() {
        let mut cfg = PatchConfig::default();
        cfg.apply_overrides(lookup(&[
            ("PORT", "8000"),
            ("SELF_HOST", "feeds.example.org"),
            ("REQUEST_TIMEOUT_MSEC", "20000"),
            ("FETCH_TIMEOUT_MSEC", "1000"),
            ("ALLOW_PRIVATE_NETWORKS", "true"),
        ]));
        assert_eq!(cfg.server.port, 8000);
        assert_eq!(cfg.server.self_host, "feeds.example.org");
        assert_eq!(cfg.server.request_timeout_ms, 20_000);
        assert_eq!(cfg.fetch.timeout_ms, 1_000);
        assert_eq!(cfg.fetch.network_policy, NetworkPolicy::Unrestricted);
    }

    #[test]
    fn test_legacy_aliases() {
        let mut cfg = PatchConfig::default();
        cfg.apply_overrides(lookup(&[
            ("PATCHRSS_HOST", "legacy.example.org:8443"),
            ("HONO_REQUEST_TIMEOUT_MSEC", "3000"),
        ]));
        assert_eq!(cfg.server.self_host, "legacy.example.org:8443");
        assert_eq!(cfg.server.request_timeout_ms, 3_000);

        // The primary name wins over the alias.
        let mut cfg = PatchConfig::default();
        cfg.apply_overrides(lookup(&[
            ("SELF_HOST", "new.example.org"),
            ("PATCHRSS_HOST", "old.example.org"),
        ]));
        assert_eq!(cfg.server.self_host, "new.example.org");
    }

    #[test]
    fn test_bad_numbers_keep_previous_value() {
        let mut cfg = PatchConfig::default();
        cfg.apply_overrides(lookup(&[("PORT", "eighty"), ("FETCH_TIMEOUT_MSEC", "-1")]));
        assert_eq!(cfg.server.port, 3000);
        assert_eq!(cfg.fetch.timeout_ms, 5_000);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let cfg = PatchConfig::load_or_default("/nonexistent/patchrss.toml");
        assert!(!cfg.server.self_host.is_empty());
    }
}
