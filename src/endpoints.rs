//! Endpoint pipeline: fetch, extract, normalize, diff, alert, persist.
//!
//! [`EndpointMonitor::run_single`] is the pure cycle over one in-memory
//! endpoint. It mutates the endpoint only after every fallible step has
//! succeeded, so a failed cycle leaves the stored state as it was and the
//! endpoint is retried whole on its next tick.
//!
//! [`EndpointMonitor::run_by_schedule`] and [`EndpointMonitor::run_url`]
//! wrap it with the per-URL lock and the crawl-state update.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{MonitorError, Result};
use crate::extract::ContentExtractor;
use crate::fetch::Fetcher;
use crate::lock::KeyedLock;
use crate::models::{BatchReport, Endpoint, Profile};
use crate::normalize::{join_records, normalize_records, split_records, RECORD_TERMINATOR};
use crate::notify::Notifier;
use crate::store::{EndpointUpdate, Store};
use crate::textdiff::unified_diff;

/// Attachment kind for content diffs.
pub const DIFF_ATTACHMENT: &str = "diff";
/// Attachment kind for status-code transitions.
pub const BASIC_ATTACHMENT: &str = "basic";

pub struct EndpointMonitor {
    store: Arc<dyn Store>,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn ContentExtractor>,
    notifier: Arc<dyn Notifier>,
    locks: KeyedLock,
}

impl EndpointMonitor {
    pub fn new(
        store: Arc<dyn Store>,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn ContentExtractor>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            fetcher,
            extractor,
            notifier,
            locks: KeyedLock::new(),
        }
    }

    /// Replace the in-process locks, e.g. with ones backed by a lock
    /// directory shared with other `cmon` processes.
    pub fn with_locks(mut self, locks: KeyedLock) -> Self {
        self.locks = locks;
        self
    }

    /// Run every live endpoint in the `interval_hours` bucket, one at a
    /// time. Per-endpoint failures are logged and collected.
    pub async fn run_by_schedule(&self, interval_hours: u32) -> Result<BatchReport> {
        let endpoints = self.store.get_endpoints_by_schedule(interval_hours).await?;
        info!(interval_hours, count = endpoints.len(), "running endpoint batch");

        let mut report = BatchReport {
            processed: endpoints.len(),
            errors: Vec::new(),
        };
        for endpoint in &endpoints {
            if let Err(e) = self.run_url(&endpoint.url).await {
                warn!(url = %endpoint.url, error = %e, "endpoint cycle failed");
                report.errors.push(e);
            }
        }
        Ok(report)
    }

    /// One locked cycle for a stored endpoint, persisting the new crawl
    /// state on success.
    pub async fn run_url(&self, url: &str) -> Result<()> {
        let _guard = self.locks.acquire(url).await?;

        // Reload under the lock so a concurrent run's result is the baseline.
        let mut endpoint = self
            .store
            .get_endpoint_by_url(url)
            .await?
            .ok_or_else(|| MonitorError::NotFound(format!("endpoint {}", url)))?;

        self.run_single(&mut endpoint).await?;
        self.store
            .update_endpoint(&endpoint, EndpointUpdate::Crawl)
            .await
    }

    /// Fetch, extract and compare one endpoint, alerting on changes.
    /// On success the endpoint holds the new crawl state; the caller
    /// persists it.
    pub async fn run_single(&self, endpoint: &mut Endpoint) -> Result<()> {
        let response = self.fetcher.get(&endpoint.url).await?;

        let extra_args = match endpoint.profile {
            Profile::Html => vec![endpoint.selector.clone()],
            Profile::Script => Vec::new(),
        };
        let extracted = self
            .extractor
            .extract(endpoint.profile, &response.body, &extra_args)
            .await?;

        let new_body = join_records(&normalize_records(&extracted));
        let old_body = split_records(&endpoint.response_body, RECORD_TERMINATOR)
            .join(&RECORD_TERMINATOR);

        let diff = unified_diff(&endpoint.url, &old_body, &new_body);
        if !diff.is_empty() {
            info!(url = %endpoint.url, diff_length = diff.len(), "content changed");
            self.notifier
                .send(&endpoint.url, &diff, DIFF_ATTACHMENT)
                .await?;
        }

        if endpoint.status_code != 0 && endpoint.status_code != response.status_code {
            info!(
                url = %endpoint.url,
                previous = endpoint.status_code,
                new = response.status_code,
                "status code changed"
            );
            let message = status_change_message(
                &endpoint.url,
                endpoint.status_code,
                response.status_code,
            );
            self.notifier.send(&message, "", BASIC_ATTACHMENT).await?;
        }

        endpoint.previous_response_body = std::mem::take(&mut endpoint.response_body);
        endpoint.response_body = new_body;
        endpoint.status_code = response.status_code;
        Ok(())
    }
}

pub fn status_change_message(url: &str, previous: u16, new: u16) -> String {
    format!(
        "endpoint: {}\nstatus code has changed: \nprevious: {}\nnew: {}\n",
        url, previous, new
    )
}
