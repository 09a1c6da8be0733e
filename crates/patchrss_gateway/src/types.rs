use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use patchrss_core::error::ErrorKind;
use patchrss_core::PatchError;
use serde::Deserialize;

/// Query string of `GET /rss`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RssQuery {
    /// Upstream feed to fetch. Absent and empty are both "not specified".
    #[serde(default)]
    pub url: Option<String>,
}

impl RssQuery {
    /// Build from decoded query pairs. The first `url` wins.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let url = pairs
            .into_iter()
            .find_map(|(key, value)| (key == "url").then_some(value));
        Self { url }
    }
}

/// [`PatchError`] as an HTTP response: its status code and plain-text
/// client message.
#[derive(Debug)]
pub struct ApiError(pub PatchError);

impl From<PatchError> for ApiError {
    fn from(err: PatchError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        match err.kind() {
            ErrorKind::ClientInput => tracing::debug!(error = %err, "Rejected request"),
            ErrorKind::PolicyBlock | ErrorKind::UpstreamBad | ErrorKind::UpstreamFormat => {
                tracing::warn!(error = %err, "Upstream refused")
            }
            ErrorKind::UpstreamTransport | ErrorKind::Internal => {
                tracing::error!(error = %err, "Request failed")
            }
        }

        // Upstream statuses are passed through; anything axum can't represent
        // is reported as a bad gateway.
        let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
        (status, err.client_message()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_first_url_wins() {
        let query = RssQuery::from_pairs(pairs(&[
            ("utm", "x"),
            ("url", "https://a.example/feed"),
            ("url", "https://b.example/feed"),
        ]));
        assert_eq!(query.url.as_deref(), Some("https://a.example/feed"));
    }

    #[test]
    fn test_no_url_pair() {
        assert!(RssQuery::from_pairs(pairs(&[("u", "x")])).url.is_none());
        assert!(RssQuery::from_pairs(Vec::new()).url.is_none());
    }

    #[test]
    fn test_status_passthrough() {
        let resp = ApiError(PatchError::UpstreamStatus {
            status: 418,
            status_text: "I'm a teapot".into(),
        })
        .into_response();
        assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
    }

    #[test]
    fn test_out_of_range_status_becomes_bad_gateway() {
        let resp = ApiError(PatchError::UpstreamStatus {
            status: 1000,
            status_text: String::new(),
        })
        .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_plain_text_body() {
        let resp = ApiError(PatchError::MissingParam).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            resp.headers()["content-type"],
            "text/plain; charset=utf-8"
        );
    }
}
