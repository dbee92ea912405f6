//! Storage abstraction for monitored subjects and diff records.
//!
//! The [`Store`] trait is the narrow interface the pipelines persist
//! through. Implementations must be `Send + Sync`: scheduled tasks for
//! different buckets and both pipelines call into the same store
//! concurrently, and each call is expected to be independently safe.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`get_endpoints_by_schedule`](Store::get_endpoints_by_schedule) | Non-deleted endpoints in a bucket |
//! | [`update_endpoint`](Store::update_endpoint) | Persist crawl state or operator settings |
//! | [`get_repositories_by_schedule`](Store::get_repositories_by_schedule) | Non-deleted repositories in a bucket |
//! | [`create_diff`](Store::create_diff) | Record a detected repository change |
//! | [`get_all_diffs`](Store::get_all_diffs) | Diff listing, newest first, without bodies |

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Diff, Endpoint, Repository};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Which columns an endpoint update writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointUpdate {
    /// Written by the endpoint pipeline after a cycle: status code and
    /// both bodies, plus selector and profile.
    Crawl,
    /// Written by operators: selector, profile, schedule and the
    /// soft-delete flag. Crawl state is left alone.
    Settings,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_endpoints_by_schedule(&self, schedule_hours: u32) -> Result<Vec<Endpoint>>;

    async fn get_endpoint_by_url(&self, url: &str) -> Result<Option<Endpoint>>;

    async fn get_all_endpoints(&self) -> Result<Vec<Endpoint>>;

    async fn create_endpoint(&self, endpoint: &Endpoint) -> Result<()>;

    async fn update_endpoint(&self, endpoint: &Endpoint, update: EndpointUpdate) -> Result<()>;

    /// Remove an endpoint row. Returns the number of rows removed.
    async fn delete_endpoint(&self, url: &str) -> Result<u64>;

    async fn get_repositories_by_schedule(&self, schedule_hours: u32) -> Result<Vec<Repository>>;

    async fn get_repository_by_url(&self, url: &str) -> Result<Option<Repository>>;

    async fn get_all_repositories(&self) -> Result<Vec<Repository>>;

    async fn create_repository(&self, repository: &Repository) -> Result<()>;

    async fn update_repository(&self, repository: &Repository) -> Result<()>;

    async fn create_diff(&self, diff: &Diff) -> Result<()>;

    async fn get_diff(&self, id: &str) -> Result<Option<Diff>>;

    /// All diffs ordered by creation time, newest first. Bodies are empty.
    async fn get_all_diffs(&self) -> Result<Vec<Diff>>;
}
