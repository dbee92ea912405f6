//! Error kinds raised by the change-detection pipelines.
//!
//! Every per-subject failure inside a batch is one of these variants. The
//! batch runners log and collect them; only [`MonitorError::Configuration`]
//! is fatal, and only at startup.

use thiserror::Error;

/// Result alias used throughout the core.
pub type Result<T> = std::result::Result<T, MonitorError>;

#[derive(Error, Debug)]
pub enum MonitorError {
    /// Network or transport failure while fetching an endpoint.
    #[error("fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    /// The extractor process reported an error, or was misconfigured.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// Clone/open/pull/patch failure.
    #[error("git error: {0}")]
    Git(String),

    /// The alert channel rejected or failed to deliver a message.
    #[error("alert delivery failed: {0}")]
    Notify(String),

    /// Store operation failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Missing or invalid settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A single-subject lookup found nothing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed operator input (CLI arguments, stored JSON).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl MonitorError {
    pub fn fetch(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn extraction(message: impl std::fmt::Display) -> Self {
        Self::Extraction(message.to_string())
    }

    pub fn git(message: impl std::fmt::Display) -> Self {
        Self::Git(message.to_string())
    }

    pub fn notify(message: impl std::fmt::Display) -> Self {
        Self::Notify(message.to_string())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

impl From<sqlx::Error> for MonitorError {
    fn from(e: sqlx::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidInput(e.to_string())
    }
}
