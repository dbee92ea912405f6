//! Repository pipeline: pull a tracked clone and record watched changes.
//!
//! Each cycle opens (or first clones) the local checkout, pulls from the
//! configured remote, and diffs the old HEAD against the new one. The
//! patch is filtered down to the chunks whose header names a watched path
//! (see [`crate::patch`]). A non-empty result is stored as a [`Diff`] and
//! announced with a link to it.
//!
//! Git work blocks, so it runs under `spawn_blocking`.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::endpoints::DIFF_ATTACHMENT;
use crate::error::{MonitorError, Result};
use crate::git::{GitTransport, OpenOutcome};
use crate::lock::KeyedLock;
use crate::models::{BatchReport, Diff, Repository};
use crate::notify::Notifier;
use crate::patch::extract_watched_chunks;
use crate::store::Store;

pub struct RepositoryMonitor {
    store: Arc<dyn Store>,
    git: Arc<dyn GitTransport>,
    notifier: Arc<dyn Notifier>,
    public_base_url: String,
    locks: KeyedLock,
}

impl RepositoryMonitor {
    pub fn new(
        store: Arc<dyn Store>,
        git: Arc<dyn GitTransport>,
        notifier: Arc<dyn Notifier>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            git,
            notifier,
            public_base_url: public_base_url.into(),
            locks: KeyedLock::new(),
        }
    }

    /// Replace the in-process locks, e.g. with ones backed by a lock
    /// directory shared with other `cmon` processes.
    pub fn with_locks(mut self, locks: KeyedLock) -> Self {
        self.locks = locks;
        self
    }

    /// Pull every live repository in the `interval_hours` bucket.
    ///
    /// Failures are logged and skipped; the report never carries
    /// per-repository errors.
    pub async fn run_by_schedule(&self, interval_hours: u32) -> Result<BatchReport> {
        let repositories = self
            .store
            .get_repositories_by_schedule(interval_hours)
            .await?;
        info!(interval_hours, count = repositories.len(), "running repository batch");

        for repository in &repositories {
            if let Err(e) = self.run_url(&repository.url).await {
                warn!(url = %repository.url, error = %e, "repository cycle failed");
            }
        }
        Ok(BatchReport {
            processed: repositories.len(),
            errors: Vec::new(),
        })
    }

    /// One locked cycle for a stored repository. Returns the stored diff,
    /// if the pull brought changes to watched paths.
    pub async fn run_url(&self, url: &str) -> Result<Option<Diff>> {
        let _guard = self.locks.acquire(url).await?;

        let repository = self
            .store
            .get_repository_by_url(url)
            .await?
            .ok_or_else(|| MonitorError::NotFound(format!("repository {}", url)))?;

        let (body, commit) = self.pull_and_diff(&repository).await?;
        info!(url, commit = %commit, diff_length = body.len(), "pulled and diffed");
        if body.is_empty() {
            return Ok(None);
        }

        let diff = Diff {
            id: uuid::Uuid::new_v4().to_string(),
            body,
            url: repository.url.clone(),
            commit,
            created_at: Utc::now(),
        };
        self.store.create_diff(&diff).await?;

        let message = self.alert_message(&repository.url, &diff.id);
        if let Err(e) = self.notifier.send(&message, "", DIFF_ATTACHMENT).await {
            warn!(url, diff_id = %diff.id, error = %e, "repository alert not delivered");
        }
        Ok(Some(diff))
    }

    /// Clone a stored repository's checkout if it does not exist yet, so
    /// commits landing before the first scheduled cycle show up in it.
    pub async fn prepare_checkout(&self, url: &str) -> Result<()> {
        let _guard = self.locks.acquire(url).await?;

        let repository = self
            .store
            .get_repository_by_url(url)
            .await?
            .ok_or_else(|| MonitorError::NotFound(format!("repository {}", url)))?;
        let git = Arc::clone(&self.git);

        tokio::task::spawn_blocking(move || ensure_checkout(git.as_ref(), &repository))
            .await
            .map_err(|e| MonitorError::git(format!("git task failed: {}", e)))?
    }

    /// Open or clone, pull, and return the watched part of the patch
    /// between the old and new HEAD, together with the new HEAD hash.
    pub async fn pull_and_diff(&self, repository: &Repository) -> Result<(String, String)> {
        let watched = repository.watched_paths()?;
        let git = Arc::clone(&self.git);
        let repository = repository.clone();

        tokio::task::spawn_blocking(move || git_pull_and_diff(git.as_ref(), &repository, &watched))
            .await
            .map_err(|e| MonitorError::git(format!("git task failed: {}", e)))?
    }

    pub fn alert_message(&self, url: &str, diff_id: &str) -> String {
        format!(
            "repo: {}\n{}/diff/{}",
            url,
            self.public_base_url.trim_end_matches('/'),
            diff_id
        )
    }
}

fn git_pull_and_diff(
    git: &dyn GitTransport,
    repository: &Repository,
    watched: &[String],
) -> Result<(String, String)> {
    ensure_checkout(git, repository)?;
    let dir = Path::new(&repository.directory);

    let old_head = git.head(dir)?;
    git.pull(dir, &repository.remote)?;
    let new_head = git.head(dir)?;

    let patch = git.patch(dir, &old_head, &new_head)?;
    Ok((extract_watched_chunks(&patch, watched), new_head))
}

fn ensure_checkout(git: &dyn GitTransport, repository: &Repository) -> Result<()> {
    let dir = Path::new(&repository.directory);
    if git.open(dir)? == OpenOutcome::NotARepository {
        info!(url = %repository.url, directory = %dir.display(), "cloning repository");
        git.clone_repo(&repository.url, dir)?;
    }
    Ok(())
}

/// Default checkout directory for a repository URL: the last path
/// segment under `root`.
pub fn default_directory(root: &Path, url: &str) -> String {
    let name = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(url)
        .trim_end_matches(".git");
    root.join(name).to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directory() {
        let root = Path::new("/srv/repos");
        assert_eq!(
            default_directory(root, "https://github.com/acme/widgets"),
            "/srv/repos/widgets"
        );
        assert_eq!(
            default_directory(root, "https://github.com/acme/widgets.git/"),
            "/srv/repos/widgets"
        );
    }
}
