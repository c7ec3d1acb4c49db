//! SQLite-backed store implementations used by the `harvester` CLI.
//!
//! Each store wraps a clone of one [`SqlitePool`] and maps its trait
//! operations onto the schema created by [`crate::migrate`]. Graph triples
//! are kept as N-Triples lines per named graph; documents and vocabulary
//! rows as JSON text.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{HarvestReport, HarvestRun, Instance};
use crate::rdf::{Graph, Triple, TriplePattern};
use crate::vocab_data::VocabularyRecord;

use super::{
    GraphKey, GraphStore, HarvestRunStore, InstanceSelector, RepositoryConfigStore, SearchDocument,
    SearchIndex, VocabularyDataIndex,
};

async fn point_selector(pool: &SqlitePool, store: &str, repo_url: &str, instance: Instance) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO instance_selectors (store, repo_url, instance) VALUES (?, ?, ?)
        ON CONFLICT(store, repo_url) DO UPDATE SET instance = excluded.instance
        "#,
    )
    .bind(store)
    .bind(repo_url)
    .bind(instance.as_str())
    .execute(pool)
    .await?;
    Ok(())
}

async fn drop_selector(pool: &SqlitePool, store: &str, repo_url: &str) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM instance_selectors WHERE store = ? AND repo_url = ?")
        .bind(store)
        .bind(repo_url)
        .execute(pool)
        .await?;
    Ok(())
}

async fn read_selector(pool: &SqlitePool, store: &str, repo_url: &str) -> Result<Option<Instance>, StoreError> {
    let value: Option<String> =
        sqlx::query_scalar("SELECT instance FROM instance_selectors WHERE store = ? AND repo_url = ?")
            .bind(store)
            .bind(repo_url)
            .fetch_optional(pool)
            .await?;
    value
        .map(|v| v.parse::<Instance>().map_err(StoreError::Unavailable))
        .transpose()
}

/// Named graphs as rows of N-Triples statements.
pub struct SqliteGraphStore {
    pool: SqlitePool,
}

impl SqliteGraphStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InstanceSelector for SqliteGraphStore {
    async fn point_to(&self, repo_url: &str, instance: Instance) -> Result<(), StoreError> {
        point_selector(&self.pool, "graph", repo_url, instance).await
    }

    async fn selected(&self, repo_url: &str) -> Result<Option<Instance>, StoreError> {
        read_selector(&self.pool, "graph", repo_url).await
    }

    async fn release(&self, repo_url: &str) -> Result<(), StoreError> {
        drop_selector(&self.pool, "graph", repo_url).await
    }
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    async fn save(&self, key: &GraphKey, graph: &Graph) -> Result<(), StoreError> {
        let graph_key = key.to_string();
        let mut tx = self.pool.begin().await?;
        for triple in graph.iter() {
            sqlx::query("INSERT OR IGNORE INTO graph_triples (graph_key, statement) VALUES (?, ?)")
                .bind(&graph_key)
                .bind(triple.to_string())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn clear_named_graph(&self, key: &GraphKey) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM graph_triples WHERE graph_key = ?")
            .bind(key.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn select(&self, key: &GraphKey, pattern: &TriplePattern) -> Result<Vec<Triple>, StoreError> {
        let statements: Vec<String> =
            sqlx::query_scalar("SELECT statement FROM graph_triples WHERE graph_key = ? ORDER BY statement")
                .bind(key.to_string())
                .fetch_all(&self.pool)
                .await?;
        let graph = Graph::parse_turtle(statements.join("\n").as_bytes())
            .map_err(|e| StoreError::Unavailable(format!("corrupt graph {}: {}", key, e)))?;
        Ok(graph.iter().filter(|t| t.matches(pattern)).cloned().collect())
    }
}

/// Metadata documents as JSON rows.
pub struct SqliteSearchIndex {
    pool: SqlitePool,
}

impl SqliteSearchIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InstanceSelector for SqliteSearchIndex {
    async fn point_to(&self, repo_url: &str, instance: Instance) -> Result<(), StoreError> {
        point_selector(&self.pool, "search", repo_url, instance).await
    }

    async fn selected(&self, repo_url: &str) -> Result<Option<Instance>, StoreError> {
        read_selector(&self.pool, "search", repo_url).await
    }

    async fn release(&self, repo_url: &str) -> Result<(), StoreError> {
        drop_selector(&self.pool, "search", repo_url).await
    }
}

fn document_from_row(row: &SqliteRow) -> Result<SearchDocument, StoreError> {
    let body: String = row.try_get("body")?;
    Ok(serde_json::from_str(&body)?)
}

#[async_trait]
impl SearchIndex for SqliteSearchIndex {
    async fn bulk_index(&self, items: &[SearchDocument], index: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT OR IGNORE INTO search_indices (index_name) VALUES (?)")
            .bind(index)
            .execute(&mut *tx)
            .await?;
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO search_documents (index_name, id, repo_url, body) VALUES (?, ?, ?, ?)
                ON CONFLICT(index_name, id) DO UPDATE SET
                    repo_url = excluded.repo_url,
                    body = excluded.body
                "#,
            )
            .bind(index)
            .bind(&item.id)
            .bind(&item.repo_url)
            .bind(serde_json::to_string(item)?)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_by_repo_url(&self, repo_url: &str, index: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM search_documents WHERE index_name = ? AND repo_url = ?")
            .bind(index)
            .bind(repo_url)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn find_by_repo_url(&self, repo_url: &str, index: &str) -> Result<Vec<SearchDocument>, StoreError> {
        let rows = sqlx::query(
            "SELECT body FROM search_documents WHERE index_name = ? AND repo_url = ? ORDER BY id",
        )
        .bind(index)
        .bind(repo_url)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(document_from_row).collect()
    }

    async fn get(&self, id: &str, index: &str) -> Result<Option<SearchDocument>, StoreError> {
        let row = sqlx::query("SELECT body FROM search_documents WHERE index_name = ? AND id = ?")
            .bind(index)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(document_from_row).transpose()
    }

    async fn exists(&self, index: &str) -> Result<bool, StoreError> {
        let exists: bool =
            sqlx::query_scalar("SELECT COUNT(*) > 0 FROM search_indices WHERE index_name = ?")
                .bind(index)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn create(&self, index: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT OR IGNORE INTO search_indices (index_name) VALUES (?)")
            .bind(index)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, index: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM search_documents WHERE index_name = ?")
            .bind(index)
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM search_indices WHERE index_name = ?")
            .bind(index)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        if removed == 0 {
            return Err(StoreError::NotFound(format!("index {}", index)));
        }
        Ok(())
    }
}

/// Vocabulary rows as JSON, ordered by insertion position.
pub struct SqliteVocabularyDataIndex {
    pool: SqlitePool,
}

impl SqliteVocabularyDataIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VocabularyDataIndex for SqliteVocabularyDataIndex {
    async fn bulk_index(&self, records: &[VocabularyRecord], index: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT OR IGNORE INTO vocabulary_indices (index_name) VALUES (?)")
            .bind(index)
            .execute(&mut *tx)
            .await?;
        let next: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM vocabulary_records WHERE index_name = ?",
        )
        .bind(index)
        .fetch_one(&mut *tx)
        .await?;
        for (offset, record) in records.iter().enumerate() {
            sqlx::query("INSERT INTO vocabulary_records (index_name, position, body) VALUES (?, ?, ?)")
                .bind(index)
                .bind(next + offset as i64)
                .bind(serde_json::to_string(record)?)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn records(&self, index: &str) -> Result<Vec<VocabularyRecord>, StoreError> {
        let bodies: Vec<String> = sqlx::query_scalar(
            "SELECT body FROM vocabulary_records WHERE index_name = ? ORDER BY position",
        )
        .bind(index)
        .fetch_all(&self.pool)
        .await?;
        bodies
            .iter()
            .map(|b| serde_json::from_str(b).map_err(StoreError::from))
            .collect()
    }

    async fn exists(&self, index: &str) -> Result<bool, StoreError> {
        let exists: bool =
            sqlx::query_scalar("SELECT COUNT(*) > 0 FROM vocabulary_indices WHERE index_name = ?")
                .bind(index)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn create(&self, index: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT OR IGNORE INTO vocabulary_indices (index_name) VALUES (?)")
            .bind(index)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, index: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM vocabulary_records WHERE index_name = ?")
            .bind(index)
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM vocabulary_indices WHERE index_name = ?")
            .bind(index)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        if removed == 0 {
            return Err(StoreError::NotFound(format!("index {}", index)));
        }
        Ok(())
    }
}

/// Repository key/value config table.
pub struct SqliteRepositoryConfig {
    pool: SqlitePool,
}

impl SqliteRepositoryConfig {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RepositoryConfigStore for SqliteRepositoryConfig {
    async fn get(&self, repo_id: &str, key: &str) -> Result<Option<String>, StoreError> {
        let value = sqlx::query_scalar("SELECT value FROM repository_config WHERE repo_id = ? AND key = ?")
            .bind(repo_id)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set(&self, repo_id: &str, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO repository_config (repo_id, key, value, updated_at) VALUES (?, ?, ?, ?)
            ON CONFLICT(repo_id, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(repo_id)
        .bind(key)
        .bind(value)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn compare_and_set(
        &self,
        repo_id: &str,
        key: &str,
        expected: Option<&str>,
        value: &str,
    ) -> Result<bool, StoreError> {
        let now = Utc::now().timestamp();
        let affected = match expected {
            Some(expected) => sqlx::query(
                "UPDATE repository_config SET value = ?, updated_at = ? WHERE repo_id = ? AND key = ? AND value = ?",
            )
            .bind(value)
            .bind(now)
            .bind(repo_id)
            .bind(key)
            .bind(expected)
            .execute(&self.pool)
            .await?
            .rows_affected(),
            None => sqlx::query(
                "INSERT OR IGNORE INTO repository_config (repo_id, key, value, updated_at) VALUES (?, ?, ?, ?)",
            )
            .bind(repo_id)
            .bind(key)
            .bind(value)
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected(),
        };
        Ok(affected == 1)
    }
}

/// Harvest run history table.
pub struct SqliteRunStore {
    pool: SqlitePool,
}

impl SqliteRunStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn parse_ts(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| StoreError::Unavailable(format!("bad timestamp '{}': {}", value, e)))
}

fn parse_uuid(value: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(value).map_err(|e| StoreError::Unavailable(format!("bad uuid '{}': {}", value, e)))
}

fn run_from_row(row: &SqliteRow) -> Result<HarvestRun, StoreError> {
    let id: String = row.try_get("id")?;
    let correlation_id: String = row.try_get("correlation_id")?;
    let started_at: String = row.try_get("started_at")?;
    let ended_at: Option<String> = row.try_get("ended_at")?;
    let status: String = row.try_get("status")?;
    let report: String = row.try_get("report_json")?;
    let report: HarvestReport = serde_json::from_str(&report)?;

    Ok(HarvestRun {
        id: parse_uuid(&id)?,
        repo_id: row.try_get("repo_id")?,
        revision: row.try_get("revision")?,
        correlation_id: parse_uuid(&correlation_id)?,
        actor: row.try_get("actor")?,
        started_at: parse_ts(&started_at)?,
        ended_at: ended_at.as_deref().map(parse_ts).transpose()?,
        status: status.parse().map_err(StoreError::Unavailable)?,
        reason: row.try_get("reason")?,
        report,
    })
}

const RUN_COLUMNS: &str =
    "id, repo_id, revision, correlation_id, actor, started_at, ended_at, status, reason, report_json";

#[async_trait]
impl HarvestRunStore for SqliteRunStore {
    async fn insert(&self, run: &HarvestRun) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO harvest_runs
                (id, repo_id, revision, correlation_id, actor, started_at, ended_at, status, reason, report_json)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run.id.to_string())
        .bind(&run.repo_id)
        .bind(&run.revision)
        .bind(run.correlation_id.to_string())
        .bind(&run.actor)
        .bind(run.started_at.to_rfc3339())
        .bind(run.ended_at.map(|t| t.to_rfc3339()))
        .bind(run.status.as_str())
        .bind(&run.reason)
        .bind(serde_json::to_string(&run.report)?)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!("run {} already recorded", run.id)));
        }
        Ok(())
    }

    async fn update(&self, run: &HarvestRun) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE harvest_runs SET revision = ?, ended_at = ?, status = ?, reason = ?, report_json = ?
            WHERE id = ?
            "#,
        )
        .bind(&run.revision)
        .bind(run.ended_at.map(|t| t.to_rfc3339()))
        .bind(run.status.as_str())
        .bind(&run.reason)
        .bind(serde_json::to_string(&run.report)?)
        .bind(run.id.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("run {}", run.id)));
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<HarvestRun>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM harvest_runs WHERE id = ?", RUN_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(run_from_row).transpose()
    }

    async fn last_success(&self, repo_id: &str, revision: &str) -> Result<Option<HarvestRun>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM harvest_runs WHERE repo_id = ? AND revision = ? AND status = 'SUCCESS' \
             ORDER BY started_at DESC LIMIT 1",
            RUN_COLUMNS
        ))
        .bind(repo_id)
        .bind(revision)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(run_from_row).transpose()
    }

    async fn list(&self, repo_id: &str, limit: usize) -> Result<Vec<HarvestRun>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM harvest_runs WHERE repo_id = ? ORDER BY started_at DESC LIMIT ?",
            RUN_COLUMNS
        ))
        .bind(repo_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(run_from_row).collect()
    }
}
