//! SQLite-backed [`Store`] implementation.
//!
//! Maps each [`Store`] operation onto the schema created by
//! [`crate::migrate::run_migrations`]. Timestamps are stored as Unix
//! milliseconds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::{MonitorError, Result};
use crate::models::{Diff, Endpoint, Profile, Repository};

use super::{EndpointUpdate, Store};

const ENDPOINT_COLUMNS: &str = "url, selector, profile, schedule_hours, status_code, \
     response_body, previous_response_body, deleted, updated_at";

const REPOSITORY_COLUMNS: &str =
    "url, directory, watched_files, remote, schedule_hours, deleted, updated_at";

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn ts_from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn narrow<T: TryFrom<i64>>(value: i64, column: &str) -> Result<T> {
    T::try_from(value)
        .map_err(|_| MonitorError::Persistence(format!("{} out of range: {}", column, value)))
}

fn endpoint_from_row(row: &SqliteRow) -> Result<Endpoint> {
    let profile: String = row.try_get("profile")?;
    Ok(Endpoint {
        url: row.try_get("url")?,
        selector: row.try_get("selector")?,
        profile: Profile::parse(&profile),
        schedule_hours: narrow(row.try_get("schedule_hours")?, "schedule_hours")?,
        status_code: narrow(row.try_get("status_code")?, "status_code")?,
        response_body: row.try_get("response_body")?,
        previous_response_body: row.try_get("previous_response_body")?,
        deleted: row.try_get("deleted")?,
        updated_at: ts_from_millis(row.try_get("updated_at")?),
    })
}

fn repository_from_row(row: &SqliteRow) -> Result<Repository> {
    Ok(Repository {
        url: row.try_get("url")?,
        directory: row.try_get("directory")?,
        watched_files: row.try_get("watched_files")?,
        remote: row.try_get("remote")?,
        schedule_hours: narrow(row.try_get("schedule_hours")?, "schedule_hours")?,
        deleted: row.try_get("deleted")?,
        updated_at: ts_from_millis(row.try_get("updated_at")?),
    })
}

fn diff_from_row(row: &SqliteRow) -> Result<Diff> {
    Ok(Diff {
        id: row.try_get("id")?,
        body: row.try_get("body")?,
        url: row.try_get("url")?,
        commit: row.try_get("commit_hash")?,
        created_at: ts_from_millis(row.try_get("created_at")?),
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_endpoints_by_schedule(&self, schedule_hours: u32) -> Result<Vec<Endpoint>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM endpoints WHERE schedule_hours = ? AND deleted = 0 ORDER BY rowid",
            ENDPOINT_COLUMNS
        ))
        .bind(i64::from(schedule_hours))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(endpoint_from_row).collect()
    }

    async fn get_endpoint_by_url(&self, url: &str) -> Result<Option<Endpoint>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM endpoints WHERE url = ?",
            ENDPOINT_COLUMNS
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(endpoint_from_row).transpose()
    }

    async fn get_all_endpoints(&self) -> Result<Vec<Endpoint>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM endpoints ORDER BY rowid",
            ENDPOINT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(endpoint_from_row).collect()
    }

    async fn create_endpoint(&self, endpoint: &Endpoint) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO endpoints ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            ENDPOINT_COLUMNS
        ))
        .bind(&endpoint.url)
        .bind(&endpoint.selector)
        .bind(endpoint.profile.as_str())
        .bind(i64::from(endpoint.schedule_hours))
        .bind(i64::from(endpoint.status_code))
        .bind(&endpoint.response_body)
        .bind(&endpoint.previous_response_body)
        .bind(endpoint.deleted)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_endpoint(&self, endpoint: &Endpoint, update: EndpointUpdate) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        let result = match update {
            EndpointUpdate::Crawl => {
                sqlx::query(
                    r#"
                    UPDATE endpoints SET
                        status_code = ?,
                        response_body = ?,
                        previous_response_body = ?,
                        selector = ?,
                        profile = ?,
                        updated_at = ?
                    WHERE url = ?
                    "#,
                )
                .bind(i64::from(endpoint.status_code))
                .bind(&endpoint.response_body)
                .bind(&endpoint.previous_response_body)
                .bind(&endpoint.selector)
                .bind(endpoint.profile.as_str())
                .bind(now)
                .bind(&endpoint.url)
                .execute(&self.pool)
                .await?
            }
            EndpointUpdate::Settings => {
                sqlx::query(
                    r#"
                    UPDATE endpoints SET
                        selector = ?,
                        profile = ?,
                        schedule_hours = ?,
                        deleted = ?,
                        updated_at = ?
                    WHERE url = ?
                    "#,
                )
                .bind(&endpoint.selector)
                .bind(endpoint.profile.as_str())
                .bind(i64::from(endpoint.schedule_hours))
                .bind(endpoint.deleted)
                .bind(now)
                .bind(&endpoint.url)
                .execute(&self.pool)
                .await?
            }
        };
        if result.rows_affected() == 0 {
            return Err(MonitorError::NotFound(format!("endpoint {}", endpoint.url)));
        }
        Ok(())
    }

    async fn delete_endpoint(&self, url: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM endpoints WHERE url = ?")
            .bind(url)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn get_repositories_by_schedule(&self, schedule_hours: u32) -> Result<Vec<Repository>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM repositories WHERE schedule_hours = ? AND deleted = 0 ORDER BY rowid",
            REPOSITORY_COLUMNS
        ))
        .bind(i64::from(schedule_hours))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(repository_from_row).collect()
    }

    async fn get_repository_by_url(&self, url: &str) -> Result<Option<Repository>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM repositories WHERE url = ?",
            REPOSITORY_COLUMNS
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(repository_from_row).transpose()
    }

    async fn get_all_repositories(&self) -> Result<Vec<Repository>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM repositories ORDER BY rowid",
            REPOSITORY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(repository_from_row).collect()
    }

    async fn create_repository(&self, repository: &Repository) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO repositories ({}) VALUES (?, ?, ?, ?, ?, ?, ?)",
            REPOSITORY_COLUMNS
        ))
        .bind(&repository.url)
        .bind(&repository.directory)
        .bind(&repository.watched_files)
        .bind(&repository.remote)
        .bind(i64::from(repository.schedule_hours))
        .bind(repository.deleted)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_repository(&self, repository: &Repository) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE repositories SET
                directory = ?,
                watched_files = ?,
                remote = ?,
                schedule_hours = ?,
                deleted = ?,
                updated_at = ?
            WHERE url = ?
            "#,
        )
        .bind(&repository.directory)
        .bind(&repository.watched_files)
        .bind(&repository.remote)
        .bind(i64::from(repository.schedule_hours))
        .bind(repository.deleted)
        .bind(Utc::now().timestamp_millis())
        .bind(&repository.url)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(MonitorError::NotFound(format!(
                "repository {}",
                repository.url
            )));
        }
        Ok(())
    }

    async fn create_diff(&self, diff: &Diff) -> Result<()> {
        sqlx::query(
            "INSERT INTO diffs (id, body, url, commit_hash, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&diff.id)
        .bind(&diff.body)
        .bind(&diff.url)
        .bind(&diff.commit)
        .bind(diff.created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_diff(&self, id: &str) -> Result<Option<Diff>> {
        let row = sqlx::query(
            "SELECT id, body, url, commit_hash, created_at FROM diffs WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(diff_from_row).transpose()
    }

    async fn get_all_diffs(&self) -> Result<Vec<Diff>> {
        let rows = sqlx::query(
            "SELECT id, '' AS body, url, commit_hash, created_at FROM diffs \
             ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(diff_from_row).collect()
    }
}
