//! End-to-end tests of the `cmon` binary. None of these reach the network.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn cmon_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("cmon");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/cmon.sqlite"

[scheduler]
buckets_hours = [8, 24, 168]

[repositories]
root = "{root}/repos"

[alerts]
public_base_url = "https://monitor.example"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("cmon.toml");
    fs::write(&config_path, config_content).unwrap();
    (tmp, config_path)
}

fn run_cmon(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = cmon_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run cmon binary at {:?}: {}", binary, e));

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[test]
fn test_init_is_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_cmon(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));

    let (_, _, success) = run_cmon(&config_path, &["init"]);
    assert!(success, "second init failed");
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_cmon(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("nope.toml"));
}

#[test]
fn test_run_on_empty_bucket() {
    let (_tmp, config_path) = setup_test_env();
    run_cmon(&config_path, &["init"]);

    let (stdout, stderr, success) = run_cmon(&config_path, &["run", "8"]);
    assert!(success, "run failed: {}", stderr);
    assert!(stdout.contains("Running crawler on 0 endpoint(s)."));
}

#[test]
fn test_html_endpoint_requires_selector() {
    let (_tmp, config_path) = setup_test_env();
    run_cmon(&config_path, &["init"]);

    let (_, stderr, success) = run_cmon(
        &config_path,
        &["endpoint", "add", "https://example.com", "--profile", "html"],
    );
    assert!(!success);
    assert!(stderr.contains("selector"));

    let (stdout, _, _) = run_cmon(&config_path, &["endpoint", "list"]);
    assert!(stdout.contains("No endpoints."));
}

fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args([
            "-c",
            "user.name=Monitor Test",
            "-c",
            "user.email=monitor@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git must be installed");
    assert!(output.status.success(), "git {:?} failed", args);
}

#[test]
fn test_repo_add_list_delete() {
    let (tmp, config_path) = setup_test_env();
    run_cmon(&config_path, &["init"]);
    // Unreachable upstream: the add still succeeds, the clone is retried later.
    let url = tmp.path().join("missing").join("widgets");
    let url = url.to_string_lossy();

    let (stdout, stderr, success) = run_cmon(
        &config_path,
        &["repo", "add", &url, "--watch", r#"["README.md"]"#],
    );
    assert!(success, "repo add failed: {}", stderr);
    let expected_dir = tmp.path().join("repos").join("widgets");
    assert!(stdout.contains(&expected_dir.display().to_string()));
    assert!(!expected_dir.join(".git").exists());

    let (stdout, _, _) = run_cmon(&config_path, &["repo", "list"]);
    assert!(stdout.contains(url.as_ref()));
    assert!(stdout.contains("active"));

    let (_, _, success) = run_cmon(&config_path, &["repo", "delete", &url]);
    assert!(success);
    let (stdout, _, _) = run_cmon(&config_path, &["repo", "list"]);
    assert!(stdout.contains("deleted"));
}

#[test]
fn test_repo_add_clones_checkout() {
    let (tmp, config_path) = setup_test_env();
    run_cmon(&config_path, &["init"]);

    let upstream = tmp.path().join("upstream").join("gears");
    fs::create_dir_all(&upstream).unwrap();
    git(&upstream, &["init", "-q"]);
    fs::write(upstream.join("README.md"), "# Gears\n").unwrap();
    git(&upstream, &["add", "-A"]);
    git(&upstream, &["commit", "-q", "-m", "initial"]);

    let (_, stderr, success) = run_cmon(
        &config_path,
        &[
            "repo",
            "add",
            &upstream.to_string_lossy(),
            "--watch",
            r#"["README.md"]"#,
        ],
    );
    assert!(success, "repo add failed: {}", stderr);
    let checkout = tmp.path().join("repos").join("gears");
    assert!(checkout.join("README.md").exists());
}

#[test]
fn test_repo_add_rejects_bad_watch_list() {
    let (_tmp, config_path) = setup_test_env();
    run_cmon(&config_path, &["init"]);

    let (_, stderr, success) = run_cmon(
        &config_path,
        &["repo", "add", "https://github.com/acme/widgets", "--watch", "README.md"],
    );
    assert!(!success);
    assert!(stderr.contains("JSON array"));
}

#[test]
fn test_diff_commands_on_empty_database() {
    let (_tmp, config_path) = setup_test_env();
    run_cmon(&config_path, &["init"]);

    let (stdout, _, success) = run_cmon(&config_path, &["diff", "list"]);
    assert!(success);
    assert!(stdout.contains("No diffs."));

    let (_, stderr, success) = run_cmon(&config_path, &["diff", "show", "missing"]);
    assert!(!success);
    assert!(stderr.contains("diff not found"));
}
