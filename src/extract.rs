//! Content extraction capability.
//!
//! Turning a fetched page into content records is delegated to a
//! replaceable extractor selected by [`Profile`]. The process-backed
//! implementation runs an external script per profile, feeding the page on
//! stdin and reading one record per line from stdout. The in-process
//! implementation dispatches to registered closures.
//!
//! # Process protocol
//!
//! ```text
//! <interpreter> <absolute script path> [extra args...]  < page body
//! ```
//!
//! Any output on stderr means failure, whatever the exit status.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::ExtractorConfig;
use crate::error::{MonitorError, Result};
use crate::models::Profile;

#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Extract raw newline-separated records from `raw`.
    async fn extract(&self, profile: Profile, raw: &[u8], extra_args: &[String])
        -> Result<Vec<u8>>;
}

// ═══════════════════════════════════════════════════════════════════════
// External process
// ═══════════════════════════════════════════════════════════════════════

/// Runs one external script per profile.
pub struct ProcessExtractor {
    interpreter: String,
    scripts: HashMap<&'static str, PathBuf>,
}

impl ProcessExtractor {
    pub fn new(config: &ExtractorConfig) -> Self {
        let mut scripts = HashMap::new();
        if let Some(p) = &config.html_script {
            scripts.insert(Profile::Html.as_str(), p.clone());
        }
        if let Some(p) = &config.script_script {
            scripts.insert(Profile::Script.as_str(), p.clone());
        }
        Self {
            interpreter: config.interpreter.clone(),
            scripts,
        }
    }

    fn script_for(&self, profile: Profile) -> Result<&Path> {
        self.scripts
            .get(profile.as_str())
            .map(PathBuf::as_path)
            .ok_or_else(|| {
                MonitorError::extraction(format!(
                    "no extractor script configured for profile '{}'",
                    profile
                ))
            })
    }
}

#[async_trait]
impl ContentExtractor for ProcessExtractor {
    async fn extract(
        &self,
        profile: Profile,
        raw: &[u8],
        extra_args: &[String],
    ) -> Result<Vec<u8>> {
        let script = self.script_for(profile)?;
        run_script(&self.interpreter, script, raw, extra_args).await
    }
}

/// Run `interpreter script args...` with `stdin` piped in.
pub async fn run_script(
    interpreter: &str,
    script: &Path,
    stdin: &[u8],
    extra_args: &[String],
) -> Result<Vec<u8>> {
    if !script.is_absolute() {
        return Err(MonitorError::extraction(format!(
            "script path not absolute: {}",
            script.display()
        )));
    }

    debug!(interpreter, script = %script.display(), args = ?extra_args, "running extractor");

    let mut child = tokio::process::Command::new(interpreter)
        .arg(script)
        .args(extra_args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| MonitorError::extraction(format!("failed to spawn {}: {}", interpreter, e)))?;

    // Write stdin from a separate task so a chatty child cannot deadlock
    // on a full stdout pipe while we are still writing.
    let writer = child.stdin.take().map(|mut pipe| {
        let input = stdin.to_vec();
        tokio::spawn(async move {
            let _ = pipe.write_all(&input).await;
            let _ = pipe.shutdown().await;
        })
    });

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| MonitorError::extraction(format!("extractor did not complete: {}", e)))?;
    if let Some(handle) = writer {
        let _ = handle.await;
    }

    if !output.stderr.is_empty() {
        return Err(MonitorError::extraction(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(output.stdout)
}

// ═══════════════════════════════════════════════════════════════════════
// In-process
// ═══════════════════════════════════════════════════════════════════════

type ExtractFn = dyn Fn(&[u8], &[String]) -> Result<Vec<u8>> + Send + Sync;

/// Dispatches to closures registered per profile.
#[derive(Default, Clone)]
pub struct InProcessExtractor {
    handlers: HashMap<&'static str, Arc<ExtractFn>>,
}

impl InProcessExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler<F>(mut self, profile: Profile, f: F) -> Self
    where
        F: Fn(&[u8], &[String]) -> Result<Vec<u8>> + Send + Sync + 'static,
    {
        self.handlers.insert(profile.as_str(), Arc::new(f));
        self
    }
}

#[async_trait]
impl ContentExtractor for InProcessExtractor {
    async fn extract(
        &self,
        profile: Profile,
        raw: &[u8],
        extra_args: &[String],
    ) -> Result<Vec<u8>> {
        let handler = self.handlers.get(profile.as_str()).ok_or_else(|| {
            MonitorError::extraction(format!("no in-process handler for profile '{}'", profile))
        })?;
        handler(raw, extra_args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_relative_script_rejected() {
        let err = run_script("sh", Path::new("relative.sh"), b"", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::Extraction(_)));
    }

    #[tokio::test]
    async fn test_process_stdout_and_args() {
        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("echo.sh");
        std::fs::write(&script, "cat\necho \"$1\"\n").unwrap();

        let out = run_script("sh", &script, b"line-a\n", &["sel".to_string()])
            .await
            .unwrap();
        assert_eq!(out, b"line-a\nsel\n".to_vec());
    }

    #[tokio::test]
    async fn test_any_stderr_is_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("warn.sh");
        std::fs::write(&script, "echo ok\necho 'boom' 1>&2\nexit 0\n").unwrap();

        let err = run_script("sh", &script, b"", &[]).await.unwrap_err();
        match err {
            MonitorError::Extraction(msg) => assert_eq!(msg, "boom"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_profile_script() {
        let extractor = ProcessExtractor::new(&ExtractorConfig::default());
        let err = extractor
            .extract(Profile::Html, b"<html/>", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::Extraction(_)));
    }

    #[tokio::test]
    async fn test_in_process_dispatch() {
        let extractor = InProcessExtractor::new()
            .with_handler(Profile::Html, |_raw, args| Ok(args.join("\n").into_bytes()));
        let out = extractor
            .extract(Profile::Html, b"", &["h1".to_string()])
            .await
            .unwrap();
        assert_eq!(out, b"h1".to_vec());
        assert!(extractor.extract(Profile::Script, b"", &[]).await.is_err());
    }
}
