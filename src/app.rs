//! Dependency wiring.
//!
//! Every shared collaborator (store, fetcher, extractor, git transport,
//! notifier) is built exactly once here and handed to the pipelines and
//! the scheduler as explicit `Arc`s.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::db;
use crate::endpoints::EndpointMonitor;
use crate::error::Result;
use crate::extract::{ContentExtractor, ProcessExtractor};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::git::{GitCli, GitTransport};
use crate::lock::KeyedLock;
use crate::models::BatchReport;
use crate::notify::{self, Notifier};
use crate::repositories::RepositoryMonitor;
use crate::scheduler::{BatchJob, Scheduler};
use crate::store::{SqliteStore, Store};

/// Collaborators a [`Monitor`] is assembled from.
pub struct Components {
    pub store: Arc<dyn Store>,
    pub fetcher: Arc<dyn Fetcher>,
    pub extractor: Arc<dyn ContentExtractor>,
    pub git: Arc<dyn GitTransport>,
    pub notifier: Arc<dyn Notifier>,
}

/// Both pipelines over one shared set of collaborators.
pub struct Monitor {
    pub store: Arc<dyn Store>,
    pub endpoints: Arc<EndpointMonitor>,
    pub repositories: Arc<RepositoryMonitor>,
    buckets_hours: Vec<u32>,
}

impl Monitor {
    /// Build production collaborators from configuration. The database
    /// must already be migrated.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let pool = db::connect(&config.db.path).await?;
        let notifier: Arc<dyn Notifier> = Arc::from(notify::from_config(&config.alerts));
        let components = Components {
            store: Arc::new(SqliteStore::new(pool)),
            fetcher: Arc::new(HttpFetcher::new(&config.fetcher)?),
            extractor: Arc::new(ProcessExtractor::new(&config.extractor)),
            git: Arc::new(GitCli::new()),
            notifier,
        };
        Ok(Self::new(config, components))
    }

    pub fn new(config: &Config, components: Components) -> Self {
        let endpoints = EndpointMonitor::new(
            Arc::clone(&components.store),
            components.fetcher,
            components.extractor,
            Arc::clone(&components.notifier),
        );
        let repositories = RepositoryMonitor::new(
            Arc::clone(&components.store),
            components.git,
            components.notifier,
            config.alerts.public_base_url.clone(),
        );
        let locks = lock_dir(&config.db.path);
        Self {
            store: components.store,
            endpoints: Arc::new(
                endpoints.with_locks(KeyedLock::with_lock_dir(locks.join("endpoints"))),
            ),
            repositories: Arc::new(
                repositories.with_locks(KeyedLock::with_lock_dir(locks.join("repositories"))),
            ),
            buckets_hours: config.scheduler.buckets_hours.clone(),
        }
    }

    /// Scheduler over the configured buckets, driving both pipelines.
    pub fn scheduler(&self) -> Scheduler {
        let jobs: Vec<Arc<dyn BatchJob>> = vec![
            Arc::clone(&self.endpoints) as Arc<dyn BatchJob>,
            Arc::clone(&self.repositories) as Arc<dyn BatchJob>,
        ];
        Scheduler::new(self.buckets_hours.clone(), jobs)
    }

    /// Run both batches for one bucket, endpoints first.
    pub async fn run_bucket(&self, interval_hours: u32) -> Result<(BatchReport, BatchReport)> {
        let endpoints = self.endpoints.run_by_schedule(interval_hours).await?;
        let repositories = self.repositories.run_by_schedule(interval_hours).await?;
        Ok((endpoints, repositories))
    }
}

/// Per-subject lock files live next to the database, shared by every
/// `cmon` process using it.
pub fn lock_dir(db_path: &Path) -> PathBuf {
    db_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
        .join("locks")
}
