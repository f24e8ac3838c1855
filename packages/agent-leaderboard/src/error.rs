//! Typed errors for the leaderboard pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`). Only
//! [`PipelineError`] ever reaches the caller; fetch and search errors are
//! absorbed per item and counted.

use thiserror::Error;

/// Errors raised by a page fetch (direct or rendered).
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Response arrived with a non-success status
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// Navigation or request exceeded its deadline
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// URL could not be parsed
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Rendering session failed for this page only
    #[error("render failed: {0}")]
    Render(String),

    /// The rendering collaborator could not start at all
    #[error("renderer unavailable: {0}")]
    RendererUnavailable(String),
}

impl FetchError {
    /// Whether this failure must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::RendererUnavailable(_))
    }
}

/// Errors raised by the external search capability.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Transport-level failure
    #[error("search request failed: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Provider answered with a non-success status
    #[error("search API error: {status}")]
    Status { status: u16 },

    /// Provider payload could not be decoded
    #[error("search response decode error: {0}")]
    Decode(String),
}

/// Run-level failures. Everything else is recovered locally.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Inbound parameters are unusable
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Rendering was required but its collaborator cannot start
    #[error("rendering unavailable: {0}")]
    RendererUnavailable(String),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

impl From<FetchError> for PipelineError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::RendererUnavailable(msg) => PipelineError::RendererUnavailable(msg),
            other => PipelineError::Config(other.to_string()),
        }
    }
}

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for search operations.
pub type SearchOutcome<T> = std::result::Result<T, SearchError>;

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
