pub mod config;
pub mod error;
pub mod feed;
pub mod links;

pub use config::{FetchConfig, NetworkPolicy, PatchConfig, ServerConfig};
pub use error::PatchError;
pub use feed::{Feed, FeedItem};
pub use links::is_valid_http_url;

/// Documentation page the root route redirects to and the user-agent links.
pub const DEFAULT_DOC_URL: &str = "https://blog.utgw.net/entry/patchrss";

/// Cache hint attached to every `/rss` response, success or failure.
pub const CACHE_CONTROL: &str = "public, s-maxage=60";

/// Outbound user-agent: the service name plus a link to its documentation.
pub fn user_agent(doc_url: &str) -> String {
    format!("patchrss (+{})", doc_url)
}
