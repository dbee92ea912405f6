use sqlx::SqlitePool;

use crate::error::Result;

/// Create the monitor schema. Safe to run repeatedly.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS endpoints (
            url TEXT PRIMARY KEY,
            selector TEXT NOT NULL DEFAULT '',
            profile TEXT NOT NULL DEFAULT 'js',
            schedule_hours INTEGER NOT NULL DEFAULT 24,
            status_code INTEGER NOT NULL DEFAULT 0,
            response_body BLOB NOT NULL DEFAULT x'',
            previous_response_body BLOB NOT NULL DEFAULT x'',
            deleted INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS repositories (
            url TEXT PRIMARY KEY,
            directory TEXT NOT NULL,
            watched_files TEXT NOT NULL DEFAULT '[]',
            remote TEXT NOT NULL DEFAULT 'origin',
            schedule_hours INTEGER NOT NULL DEFAULT 24,
            deleted INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS diffs (
            id TEXT PRIMARY KEY,
            body TEXT NOT NULL,
            url TEXT NOT NULL,
            commit_hash TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_endpoints_schedule ON endpoints(schedule_hours)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_repositories_schedule ON repositories(schedule_hours)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_diffs_created_at ON diffs(created_at DESC)")
        .execute(pool)
        .await?;

    Ok(())
}
