//! Per-subject advisory locking.
//!
//! A manual single-subject run and the scheduled batch covering the same
//! subject must not interleave their fetch/persist steps. Both pipelines
//! acquire the subject's key (endpoint URL or repository URL) before
//! touching the network and hold the guard until the subject's state has
//! been persisted.
//!
//! Inside one process the key maps to an async mutex. With a lock
//! directory configured, the holder also owns `<dir>/<sha256(key)>.lock`,
//! a pid file created with `create_new`, so a `cmon endpoint run` in one
//! process waits for the `cmon serve` batch in another. A lock file whose
//! pid is no longer running is stale and gets removed.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use crate::error::{MonitorError, Result};

const LOCK_WAIT_TIMEOUT: Duration = Duration::from_secs(600);
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(250);

#[derive(Default)]
pub struct KeyedLock {
    slots: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    dir: Option<PathBuf>,
}

/// Held for the duration of one subject's cycle.
pub struct KeyGuard {
    // Dropped before the in-process guard, so a waiter in this process
    // never finds its own pid in the file.
    _file: Option<LockFile>,
    _guard: OwnedMutexGuard<()>,
}

struct LockFile {
    path: PathBuf,
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[derive(Debug)]
enum LockState {
    HeldBy(u32),
    Stale,
    Unknown,
}

impl KeyedLock {
    /// Locks that only serialize callers inside this process.
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks that also serialize against other processes using `dir`.
    pub fn with_lock_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            slots: Mutex::default(),
            dir: Some(dir.into()),
        }
    }

    /// Wait until `key` is free and take it.
    pub async fn acquire(&self, key: &str) -> Result<KeyGuard> {
        let slot = {
            let mut slots = match self.slots.lock() {
                Ok(slots) => slots,
                Err(poisoned) => poisoned.into_inner(),
            };
            // Drop slots nobody holds or waits on.
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            slots
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        let guard = slot.lock_owned().await;

        let file = match &self.dir {
            Some(dir) => Some(acquire_file(&lock_path(dir, key), key).await?),
            None => None,
        };
        Ok(KeyGuard {
            _file: file,
            _guard: guard,
        })
    }
}

/// Lock file for `key` under `dir`.
pub fn lock_path(dir: &Path, key: &str) -> PathBuf {
    let digest = Sha256::digest(key.as_bytes());
    dir.join(format!("{}.lock", hex::encode(digest)))
}

async fn acquire_file(path: &Path, key: &str) -> Result<LockFile> {
    let started = Instant::now();
    loop {
        match try_acquire(path) {
            Ok(file) => return Ok(file),
            Err(LockState::Stale) => {
                debug!(key, path = %path.display(), "removing stale lock file");
                let _ = std::fs::remove_file(path);
            }
            Err(state) => {
                if started.elapsed() >= LOCK_WAIT_TIMEOUT {
                    let holder = match state {
                        LockState::HeldBy(pid) => format!("pid {}", pid),
                        _ => format!("unreadable lock file {}", path.display()),
                    };
                    return Err(MonitorError::Persistence(format!(
                        "timed out waiting for lock on {} (held by {})",
                        key, holder
                    )));
                }
                tokio::time::sleep(LOCK_RETRY_DELAY).await;
            }
        }
    }
}

fn try_acquire(path: &Path) -> std::result::Result<LockFile, LockState> {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    match OpenOptions::new().create_new(true).write(true).open(path) {
        Ok(mut file) => {
            let _ = writeln!(file, "{}", std::process::id());
            Ok(LockFile {
                path: path.to_path_buf(),
            })
        }
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
            let mut pid_buf = String::new();
            if OpenOptions::new()
                .read(true)
                .open(path)
                .and_then(|mut file| file.read_to_string(&mut pid_buf))
                .is_err()
            {
                return Err(LockState::Unknown);
            }
            match pid_buf.trim().parse::<u32>().ok() {
                Some(pid) if is_process_running(pid) => Err(LockState::HeldBy(pid)),
                Some(_) => Err(LockState::Stale),
                // Holder has created the file but not written its pid yet.
                None => Err(LockState::Unknown),
            }
        }
        Err(_) => Err(LockState::Unknown),
    }
}

fn is_process_running(pid: u32) -> bool {
    if pid == std::process::id() {
        return true;
    }
    std::process::Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(KeyedLock::new());
        let guard = locks.acquire("https://a").await.unwrap();

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire("https://a").await.unwrap();
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let locks = KeyedLock::new();
        let _a = locks.acquire("https://a").await.unwrap();
        let b = tokio::time::timeout(Duration::from_secs(1), locks.acquire("https://b")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_lock_file_created_and_removed() {
        let tmp = TempDir::new().unwrap();
        let locks = KeyedLock::with_lock_dir(tmp.path().join("locks"));
        let path = lock_path(&tmp.path().join("locks"), "https://a");

        let guard = locks.acquire("https://a").await.unwrap();
        let pid = std::fs::read_to_string(&path).unwrap();
        assert_eq!(pid.trim(), std::process::id().to_string());

        drop(guard);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_separate_handles_share_the_lock_directory() {
        let tmp = TempDir::new().unwrap();
        let first = KeyedLock::with_lock_dir(tmp.path());
        let second = Arc::new(KeyedLock::with_lock_dir(tmp.path()));

        let guard = first.acquire("https://a").await.unwrap();
        let waiter = {
            let second = second.clone();
            tokio::spawn(async move {
                let _g = second.acquire("https://a").await.unwrap();
            })
        };
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_stale_lock_file_is_reclaimed() {
        let tmp = TempDir::new().unwrap();
        let path = lock_path(tmp.path(), "https://a");
        // Far above any default pid_max.
        std::fs::write(&path, "999999999\n").unwrap();

        let locks = KeyedLock::with_lock_dir(tmp.path());
        let guard = tokio::time::timeout(Duration::from_secs(5), locks.acquire("https://a"))
            .await
            .unwrap()
            .unwrap();
        drop(guard);
        assert!(!path.exists());
    }
}
