use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use patchrss_core::{user_agent, PatchConfig, PatchError, ServerConfig};
use patchrss_feed::{parse_feed, rewrite_with_encoding};
use patchrss_fetch::{
    decode_body, downstream_content_type, output_encoding, output_label, validate, Fetcher,
};

use crate::types::{ApiError, RssQuery};

/// Shared, read-only state for every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub fetcher: Arc<Fetcher>,
}

impl AppState {
    /// Build the upstream client once; every request shares it.
    pub fn new(config: &PatchConfig) -> Result<Self, PatchError> {
        let fetcher = Fetcher::new(&config.fetch, &user_agent(&config.server.doc_url))?;
        Ok(Self {
            config: Arc::new(config.server.clone()),
            fetcher: Arc::new(fetcher),
        })
    }
}

// ============================================================================
// Route handlers
// ============================================================================

/// GET /: send visitors to the documentation.
pub async fn handle_root(State(state): State<AppState>) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, state.config.doc_url.clone())],
    )
        .into_response()
}

pub async fn health() -> &'static str {
    "ok"
}

/// GET /rss?url=<target>: fetch, parse, and re-emit the upstream feed.
///
/// Validation failures return before any outbound request is made.
/// The query string is taken as raw pairs so a repeated `url` goes through
/// validation like any other input instead of failing extraction.
#[tracing::instrument(skip_all, fields(url))]
pub async fn handle_rss(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let query = RssQuery::from_pairs(pairs);
    tracing::Span::current().record("url", query.url.as_deref().unwrap_or_default());

    let target = validate(query.url.as_deref(), &state.config.self_host)?;

    let upstream = state.fetcher.fetch(&target).await?;
    let content_type = upstream.content_type.as_deref();
    tracing::debug!(bytes = upstream.body.len(), ?content_type, "Fetched upstream");

    let body = decode_body(&upstream.body, content_type);
    let feed = parse_feed(&body)?;

    let encoding = output_encoding(content_type);
    let xml = rewrite_with_encoding(target.as_str(), &feed, &output_label(content_type))?;
    let (bytes, _, unmappable) = encoding.encode(&xml);
    if unmappable {
        tracing::debug!(encoding = encoding.name(), "Escaped characters outside the upstream charset");
    }

    tracing::info!(items = feed.items.len(), "Patched feed");
    Ok((
        [(header::CONTENT_TYPE, downstream_content_type(content_type))],
        bytes.into_owned(),
    )
        .into_response())
}
