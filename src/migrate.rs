use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table the SQLite stores use. Idempotent.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // Named graphs, one N-Triples statement per row
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS graph_triples (
            graph_key TEXT NOT NULL,
            statement TEXT NOT NULL,
            PRIMARY KEY (graph_key, statement)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Store-level read-path selectors ("graph" and "search")
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS instance_selectors (
            store TEXT NOT NULL,
            repo_url TEXT NOT NULL,
            instance TEXT NOT NULL,
            PRIMARY KEY (store, repo_url)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS search_indices (
            index_name TEXT PRIMARY KEY
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS search_documents (
            index_name TEXT NOT NULL,
            id TEXT NOT NULL,
            repo_url TEXT NOT NULL,
            body TEXT NOT NULL,
            PRIMARY KEY (index_name, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vocabulary_indices (
            index_name TEXT PRIMARY KEY
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vocabulary_records (
            index_name TEXT NOT NULL,
            position INTEGER NOT NULL,
            body TEXT NOT NULL,
            PRIMARY KEY (index_name, position)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS repository_config (
            repo_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (repo_id, key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS harvest_runs (
            id TEXT PRIMARY KEY,
            repo_id TEXT NOT NULL,
            revision TEXT,
            correlation_id TEXT NOT NULL,
            actor TEXT,
            started_at TEXT NOT NULL,
            ended_at TEXT,
            status TEXT NOT NULL,
            reason TEXT,
            report_json TEXT NOT NULL DEFAULT '{}'
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_search_documents_repo ON search_documents(index_name, repo_url)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_harvest_runs_repo ON harvest_runs(repo_id, started_at DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_harvest_runs_revision ON harvest_runs(repo_id, revision, status)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
