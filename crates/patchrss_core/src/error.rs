use thiserror::Error;

// ============================================================================
// Error taxonomy
// ============================================================================

/// Every failure the feed pipeline can surface to a client.
///
/// Each variant belongs to one kind (client input, policy block, upstream
/// status, upstream format, upstream transport) and maps to exactly one HTTP
/// status and one client-facing body via [`PatchError::status_code`] and
/// [`PatchError::client_message`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("url query parameter not specified")]
    MissingParam,

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("URL protocol must be either http or https")]
    BadScheme,

    #[error("request infinite loop detected")]
    LoopDetected,

    /// Every address the target resolved to is outside the network policy.
    #[error("request blocked by network policy: {0}")]
    BlockedByPolicy(String),

    #[error("upstream returned {status} {status_text}")]
    UpstreamStatus { status: u16, status_text: String },

    #[error("upstream body is not a valid RSS document: {0}")]
    UnparseableFeed(String),

    #[error("upstream request timed out")]
    UpstreamTimeout,

    #[error("upstream body exceeds {limit} bytes")]
    UpstreamTooLarge { limit: usize },

    #[error("upstream transport error: {0}")]
    Transport(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse error classes, used for logging levels and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ClientInput,
    PolicyBlock,
    UpstreamBad,
    UpstreamFormat,
    UpstreamTransport,
    Internal,
}

impl PatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingParam | Self::InvalidUrl(_) | Self::BadScheme | Self::LoopDetected => {
                ErrorKind::ClientInput
            }
            Self::BlockedByPolicy(_) => ErrorKind::PolicyBlock,
            Self::UpstreamStatus { .. } => ErrorKind::UpstreamBad,
            Self::UnparseableFeed(_) => ErrorKind::UpstreamFormat,
            Self::UpstreamTimeout | Self::UpstreamTooLarge { .. } | Self::Transport(_) => {
                ErrorKind::UpstreamTransport
            }
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status the gateway answers with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MissingParam | Self::InvalidUrl(_) | Self::BadScheme | Self::LoopDetected => 400,
            Self::BlockedByPolicy(_) => 403,
            Self::UpstreamStatus { status, .. } => *status,
            Self::UnparseableFeed(_) => 400,
            Self::UpstreamTimeout => 504,
            Self::UpstreamTooLarge { .. } => 502,
            Self::Transport(_) | Self::Internal(_) => 500,
        }
    }

    /// Plain-text body sent to the client.
    ///
    /// Deliberately differs from `Display` for policy, format, and transport
    /// errors: those carry upstream detail that stays in the logs.
    pub fn client_message(&self) -> String {
        match self {
            Self::MissingParam | Self::InvalidUrl(_) | Self::BadScheme | Self::LoopDetected => {
                self.to_string()
            }
            Self::BlockedByPolicy(_) => "Request blocked".to_string(),
            Self::UpstreamStatus { status_text, .. } => {
                format!("Not ok response returned: {}", status_text)
            }
            Self::UnparseableFeed(_) => "The returned response is not a valid RSS".to_string(),
            Self::UpstreamTimeout => "Upstream request timed out".to_string(),
            Self::UpstreamTooLarge { .. } => "Upstream response too large".to_string(),
            Self::Transport(_) | Self::Internal(_) => "Internal Server Error".to_string(),
        }
    }
}
