//! Git transport used by the repository pipeline.
//!
//! [`GitCli`] shells out to the `git` binary, the same way for every
//! operation: run the command, and on a non-zero exit turn stderr into a
//! [`MonitorError::Git`]. All methods block; async callers run them under
//! `tokio::task::spawn_blocking`.

use std::path::Path;
use std::process::{Command, Output};

use crate::error::{MonitorError, Result};

/// Result of looking for an existing clone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    Opened,
    /// No clone at the directory; the caller clones first.
    NotARepository,
}

pub trait GitTransport: Send + Sync {
    fn clone_repo(&self, url: &str, directory: &Path) -> Result<()>;

    fn open(&self, directory: &Path) -> Result<OpenOutcome>;

    /// Full hash of the commit at HEAD.
    fn head(&self, directory: &Path) -> Result<String>;

    /// Fast-forward the working tree from `remote`. Nothing to pull is
    /// success.
    fn pull(&self, directory: &Path, remote: &str) -> Result<()>;

    /// Unified patch between two commits, in `git diff` format.
    fn patch(&self, directory: &Path, from: &str, to: &str) -> Result<String>;
}

/// [`GitTransport`] backed by the `git` executable.
#[derive(Debug, Default, Clone)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }
}

fn git(directory: Option<&Path>, args: &[&str]) -> Result<Output> {
    let mut cmd = Command::new("git");
    if let Some(dir) = directory {
        cmd.current_dir(dir);
    }
    cmd.args(args).env("GIT_TERMINAL_PROMPT", "0");

    let output = cmd
        .output()
        .map_err(|e| MonitorError::git(format!("failed to execute 'git {}': {}", args[0], e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MonitorError::git(format!(
            "git {} failed: {}",
            args[0],
            stderr.trim()
        )));
    }
    Ok(output)
}

impl GitTransport for GitCli {
    fn clone_repo(&self, url: &str, directory: &Path) -> Result<()> {
        if let Some(parent) = directory.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    MonitorError::git(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }
        let dest = directory.to_string_lossy();
        git(None, &["clone", "--quiet", url, &dest])?;
        Ok(())
    }

    fn open(&self, directory: &Path) -> Result<OpenOutcome> {
        if !directory.join(".git").exists() {
            return Ok(OpenOutcome::NotARepository);
        }
        git(Some(directory), &["rev-parse", "--git-dir"])?;
        Ok(OpenOutcome::Opened)
    }

    fn head(&self, directory: &Path) -> Result<String> {
        let output = git(Some(directory), &["rev-parse", "HEAD"])?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn pull(&self, directory: &Path, remote: &str) -> Result<()> {
        git(
            Some(directory),
            &["pull", "--quiet", "--no-rebase", "--ff-only", remote],
        )?;
        Ok(())
    }

    fn patch(&self, directory: &Path, from: &str, to: &str) -> Result<String> {
        if from == to {
            return Ok(String::new());
        }
        let output = git(
            Some(directory),
            &["diff", "--no-color", "--no-ext-diff", from, to],
        )?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
