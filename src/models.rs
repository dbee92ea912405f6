//! Core data models for monitored subjects and detected changes.
//!
//! These types are transient copies of what the store persists. The
//! pipelines mutate them in memory during a cycle and hand them back to
//! the store afterwards.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{MonitorError, Result};

/// Extraction strategy for an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Profile {
    /// Selector-based extraction; the endpoint's selector is passed along.
    Html,
    /// Script/link reference extraction. Default for unknown profile names.
    Script,
}

impl Profile {
    pub fn parse(s: &str) -> Self {
        match s {
            "html" => Profile::Html,
            _ => Profile::Script,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Html => "html",
            Profile::Script => "js",
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A monitored URL.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub url: String,
    /// Only meaningful for [`Profile::Html`].
    pub selector: String,
    pub profile: Profile,
    pub schedule_hours: u32,
    /// Last observed status code; 0 means never observed.
    pub status_code: u16,
    /// Normalized records of the last cycle, newline-joined.
    pub response_body: Vec<u8>,
    pub previous_response_body: Vec<u8>,
    pub deleted: bool,
    pub updated_at: DateTime<Utc>,
}

impl Endpoint {
    pub fn new(url: impl Into<String>, profile: Profile, selector: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            selector: selector.into(),
            profile,
            schedule_hours: 24,
            status_code: 0,
            response_body: Vec::new(),
            previous_response_body: Vec::new(),
            deleted: false,
            updated_at: Utc::now(),
        }
    }
}

/// A monitored local clone tracking a remote.
#[derive(Debug, Clone, PartialEq)]
pub struct Repository {
    pub url: String,
    /// Local clone path.
    pub directory: String,
    /// JSON array of path substrings, as persisted.
    pub watched_files: String,
    pub remote: String,
    pub schedule_hours: u32,
    pub deleted: bool,
    pub updated_at: DateTime<Utc>,
}

impl Repository {
    pub fn new(
        url: impl Into<String>,
        directory: impl Into<String>,
        watched: &[&str],
    ) -> Self {
        Self {
            url: url.into(),
            directory: directory.into(),
            watched_files: serde_json::to_string(watched).unwrap_or_else(|_| "[]".to_string()),
            remote: "origin".to_string(),
            schedule_hours: 24,
            deleted: false,
            updated_at: Utc::now(),
        }
    }

    /// Parse the watched-files JSON into its ordered list of substrings.
    pub fn watched_paths(&self) -> Result<Vec<String>> {
        serde_json::from_str(&self.watched_files).map_err(|e| {
            MonitorError::InvalidInput(format!(
                "watched_files for {} is not a JSON string array: {}",
                self.url, e
            ))
        })
    }
}

/// Immutable record of a detected repository change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diff {
    pub id: String,
    /// Concatenated matched chunks. Empty in listings.
    pub body: String,
    pub url: String,
    pub commit: String,
    pub created_at: DateTime<Utc>,
}

/// Outcome of one batch run over a schedule bucket.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub processed: usize,
    pub errors: Vec<MonitorError>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}
