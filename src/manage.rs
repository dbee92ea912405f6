//! Operator-facing registry management.
//!
//! Validation and store calls behind the `endpoint` and `repo` CLI
//! commands. Nothing here touches the network; first cycles are run by the
//! caller through the pipelines.

use std::path::Path;

use crate::error::{MonitorError, Result};
use crate::models::{Endpoint, Profile, Repository};
use crate::repositories::default_directory;
use crate::store::{EndpointUpdate, Store};

/// Profile names accepted from operators.
pub const PROFILES: &[&str] = &["html", "js"];

#[derive(Debug, Clone, Default)]
pub struct EndpointSettings {
    pub selector: Option<String>,
    pub profile: Option<String>,
    pub schedule_hours: Option<u32>,
    pub deleted: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct RepositorySettings {
    pub directory: Option<String>,
    pub watch: Option<String>,
    pub remote: Option<String>,
    pub schedule_hours: Option<u32>,
    pub deleted: Option<bool>,
}

fn parse_profile(name: &str) -> Result<Profile> {
    if !PROFILES.contains(&name) {
        return Err(MonitorError::InvalidInput(format!(
            "unknown profile '{}', expected one of: {}",
            name,
            PROFILES.join(", ")
        )));
    }
    Ok(Profile::parse(name))
}

fn check_schedule(hours: u32) -> Result<u32> {
    if hours == 0 {
        return Err(MonitorError::InvalidInput(
            "schedule must be at least 1 hour".to_string(),
        ));
    }
    Ok(hours)
}

fn check_url(url: &str) -> Result<()> {
    if url.trim().is_empty() {
        return Err(MonitorError::InvalidInput("url is empty".to_string()));
    }
    Ok(())
}

fn check_selector(profile: Profile, selector: &str) -> Result<()> {
    if profile == Profile::Html && selector.trim().is_empty() {
        return Err(MonitorError::InvalidInput(
            "the html profile requires a selector".to_string(),
        ));
    }
    Ok(())
}

/// Validate a watched-files argument: a non-empty JSON array of strings.
pub fn parse_watch_list(raw: &str) -> Result<Vec<String>> {
    let paths: Vec<String> = serde_json::from_str(raw).map_err(|_| {
        MonitorError::InvalidInput("watched files must be a JSON array of strings".to_string())
    })?;
    if paths.is_empty() {
        return Err(MonitorError::InvalidInput(
            "watched files can't be empty".to_string(),
        ));
    }
    Ok(paths)
}

/// Register a new endpoint.
pub async fn add_endpoint(
    store: &dyn Store,
    url: &str,
    profile: &str,
    selector: Option<&str>,
    schedule_hours: Option<u32>,
) -> Result<Endpoint> {
    check_url(url)?;
    let profile = parse_profile(profile)?;
    let selector = selector.unwrap_or_default();
    check_selector(profile, selector)?;

    let mut endpoint = Endpoint::new(url, profile, selector);
    if let Some(hours) = schedule_hours {
        endpoint.schedule_hours = check_schedule(hours)?;
    }
    store.create_endpoint(&endpoint).await?;
    Ok(endpoint)
}

async fn load_endpoint(store: &dyn Store, url: &str) -> Result<Endpoint> {
    store
        .get_endpoint_by_url(url)
        .await?
        .ok_or_else(|| MonitorError::NotFound(format!("endpoint {}", url)))
}

/// Change operator settings on an endpoint. Crawl state is untouched.
pub async fn update_endpoint(
    store: &dyn Store,
    url: &str,
    settings: &EndpointSettings,
) -> Result<Endpoint> {
    let mut endpoint = load_endpoint(store, url).await?;
    if let Some(name) = &settings.profile {
        endpoint.profile = parse_profile(name)?;
    }
    if let Some(selector) = &settings.selector {
        endpoint.selector = selector.clone();
    }
    check_selector(endpoint.profile, &endpoint.selector)?;
    if let Some(hours) = settings.schedule_hours {
        endpoint.schedule_hours = check_schedule(hours)?;
    }
    if let Some(deleted) = settings.deleted {
        endpoint.deleted = deleted;
    }
    store
        .update_endpoint(&endpoint, EndpointUpdate::Settings)
        .await?;
    Ok(endpoint)
}

/// Soft-delete: the endpoint stays stored but leaves every schedule.
pub async fn soft_delete_endpoint(store: &dyn Store, url: &str) -> Result<()> {
    let settings = EndpointSettings {
        deleted: Some(true),
        ..Default::default()
    };
    update_endpoint(store, url, &settings).await.map(|_| ())
}

/// Register a new repository. `directory` defaults to the last URL
/// segment under `root`.
pub async fn add_repository(
    store: &dyn Store,
    root: &Path,
    url: &str,
    directory: Option<&str>,
    watch: &str,
    remote: Option<&str>,
    schedule_hours: Option<u32>,
) -> Result<Repository> {
    check_url(url)?;
    let watched = parse_watch_list(watch)?;
    let directory = match directory {
        Some(d) if !d.trim().is_empty() => d.to_string(),
        _ => default_directory(root, url),
    };

    let mut repository = Repository::new(url, directory, &[]);
    repository.watched_files = serde_json::to_string(&watched)?;
    if let Some(remote) = remote {
        repository.remote = remote.to_string();
    }
    if let Some(hours) = schedule_hours {
        repository.schedule_hours = check_schedule(hours)?;
    }
    store.create_repository(&repository).await?;
    Ok(repository)
}

pub async fn update_repository(
    store: &dyn Store,
    url: &str,
    settings: &RepositorySettings,
) -> Result<Repository> {
    let mut repository = store
        .get_repository_by_url(url)
        .await?
        .ok_or_else(|| MonitorError::NotFound(format!("repository {}", url)))?;
    if let Some(directory) = &settings.directory {
        repository.directory = directory.clone();
    }
    if let Some(watch) = &settings.watch {
        repository.watched_files = serde_json::to_string(&parse_watch_list(watch)?)?;
    }
    if let Some(remote) = &settings.remote {
        repository.remote = remote.clone();
    }
    if let Some(hours) = settings.schedule_hours {
        repository.schedule_hours = check_schedule(hours)?;
    }
    if let Some(deleted) = settings.deleted {
        repository.deleted = deleted;
    }
    store.update_repository(&repository).await?;
    Ok(repository)
}

pub async fn soft_delete_repository(store: &dyn Store, url: &str) -> Result<()> {
    let settings = RepositorySettings {
        deleted: Some(true),
        ..Default::default()
    };
    update_repository(store, url, &settings).await.map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn test_html_requires_selector() {
        let store = InMemoryStore::new();
        let err = add_endpoint(&store, "https://a", "html", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::InvalidInput(_)));

        let e = add_endpoint(&store, "https://a", "html", Some("div.main"), Some(8))
            .await
            .unwrap();
        assert_eq!(e.profile, Profile::Html);
        assert_eq!(e.schedule_hours, 8);
    }

    #[tokio::test]
    async fn test_unknown_profile_rejected() {
        let store = InMemoryStore::new();
        let err = add_endpoint(&store, "https://a", "pdf", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::InvalidInput(_)));
        assert!(store.get_all_endpoints().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_soft_delete_keeps_row() {
        let store = InMemoryStore::new();
        add_endpoint(&store, "https://a", "js", None, None)
            .await
            .unwrap();
        soft_delete_endpoint(&store, "https://a").await.unwrap();

        let stored = store.get_endpoint_by_url("https://a").await.unwrap().unwrap();
        assert!(stored.deleted);
        assert!(store.get_endpoints_by_schedule(24).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_soft_delete_unknown_endpoint() {
        let store = InMemoryStore::new();
        let err = soft_delete_endpoint(&store, "https://nope").await.unwrap_err();
        assert!(matches!(err, MonitorError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_add_repository_defaults() {
        let store = InMemoryStore::new();
        let repo = add_repository(
            &store,
            Path::new("/srv/repos"),
            "https://github.com/acme/widgets",
            None,
            r#"["README.md", "src/"]"#,
            None,
            None,
        )
        .await
        .unwrap();

        assert_eq!(repo.directory, "/srv/repos/widgets");
        assert_eq!(repo.remote, "origin");
        assert_eq!(repo.watched_paths().unwrap(), vec!["README.md", "src/"]);
    }

    #[test]
    fn test_watch_list_validation() {
        assert!(parse_watch_list("[]").is_err());
        assert!(parse_watch_list("README.md").is_err());
        assert!(parse_watch_list("[1, 2]").is_err());
        assert_eq!(parse_watch_list(r#"["a"]"#).unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_update_repository_watch_list() {
        let store = InMemoryStore::new();
        add_repository(&store, Path::new("r"), "u", Some("d"), r#"["a"]"#, None, None)
            .await
            .unwrap();
        let settings = RepositorySettings {
            watch: Some(r#"["b", "c"]"#.to_string()),
            schedule_hours: Some(168),
            ..Default::default()
        };
        let repo = update_repository(&store, "u", &settings).await.unwrap();
        assert_eq!(repo.watched_paths().unwrap(), vec!["b", "c"]);
        assert_eq!(repo.schedule_hours, 168);
    }
}
