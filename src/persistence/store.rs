//! SQLite-based persistence store

use crate::core::ExecutionStatus;
use crate::persistence::{ExecutionSummary, PersistenceBackend};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const SELECT_COLUMNS: &str = "SELECT id, pipeline_name, status, started_at, completed_at, progress, \
     completed_conditions, total_conditions, stages_run, failed_condition, failed_stage, error \
     FROM executions";

/// SQLite execution store
pub struct SqliteExecutionStore {
    pool: SqlitePool,
}

impl SqliteExecutionStore {
    /// Open (or create) the store at `db_path`
    pub async fn new(db_path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .with_context(|| format!("Failed to open history database {}", db_path.display()))?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    /// Default database location under the user's local data directory
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("seqflow")
            .join("executions.db")
    }

    /// Create store with default path
    pub async fn with_default_path() -> Result<Self> {
        let db_path = Self::default_path();
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        Self::new(&db_path).await
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS executions (
                id TEXT PRIMARY KEY,
                pipeline_name TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT,
                progress REAL NOT NULL DEFAULT 0.0,
                completed_conditions INTEGER NOT NULL DEFAULT 0,
                total_conditions INTEGER NOT NULL DEFAULT 0,
                stages_run INTEGER NOT NULL DEFAULT 0,
                failed_condition TEXT,
                failed_stage TEXT,
                error TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_pipeline_name ON executions(pipeline_name);
            CREATE INDEX IF NOT EXISTS idx_started_at ON executions(started_at);
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to initialize history schema")?;

        Ok(())
    }

    fn to_naive(dt: DateTime<Utc>) -> NaiveDateTime {
        dt.naive_utc()
    }

    fn from_naive(dt: NaiveDateTime) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(dt, Utc)
    }

    fn parse_status(status: &str) -> ExecutionStatus {
        match status {
            "Running" => ExecutionStatus::Running,
            "Completed" => ExecutionStatus::Completed,
            "Failed" => ExecutionStatus::Failed,
            _ => ExecutionStatus::Pending,
        }
    }

    fn from_row(row: &SqliteRow) -> Result<ExecutionSummary> {
        Ok(ExecutionSummary {
            execution_id: Uuid::parse_str(&row.try_get::<String, _>("id")?)?,
            pipeline_name: row.try_get("pipeline_name")?,
            status: Self::parse_status(&row.try_get::<String, _>("status")?),
            started_at: Self::from_naive(row.try_get("started_at")?),
            completed_at: row
                .try_get::<Option<NaiveDateTime>, _>("completed_at")?
                .map(Self::from_naive),
            progress: row.try_get("progress")?,
            completed_conditions: row.try_get::<i64, _>("completed_conditions")? as usize,
            total_conditions: row.try_get::<i64, _>("total_conditions")? as usize,
            stages_run: row.try_get::<i64, _>("stages_run")? as usize,
            failed_condition: row.try_get("failed_condition")?,
            failed_stage: row.try_get("failed_stage")?,
            error: row.try_get("error")?,
        })
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for SqliteExecutionStore {
    async fn save_execution(&self, execution: &ExecutionSummary) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO executions
            (id, pipeline_name, status, started_at, completed_at, progress,
             completed_conditions, total_conditions, stages_run, failed_condition, failed_stage, error)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(execution.execution_id.to_string())
        .bind(&execution.pipeline_name)
        .bind(format!("{:?}", execution.status))
        .bind(Self::to_naive(execution.started_at))
        .bind(execution.completed_at.map(Self::to_naive))
        .bind(execution.progress)
        .bind(execution.completed_conditions as i64)
        .bind(execution.total_conditions as i64)
        .bind(execution.stages_run as i64)
        .bind(&execution.failed_condition)
        .bind(&execution.failed_stage)
        .bind(&execution.error)
        .execute(&self.pool)
        .await
        .context("Failed to save execution")?;

        Ok(())
    }

    async fn load_execution(&self, execution_id: Uuid) -> Result<Option<ExecutionSummary>> {
        let row = sqlx::query(&format!("{} WHERE id = ?1", SELECT_COLUMNS))
            .bind(execution_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load execution")?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn list_executions(&self, pipeline_name: &str) -> Result<Vec<ExecutionSummary>> {
        let rows = sqlx::query(&format!(
            "{} WHERE pipeline_name = ?1 ORDER BY started_at DESC",
            SELECT_COLUMNS
        ))
        .bind(pipeline_name)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list executions")?;

        rows.iter().map(Self::from_row).collect()
    }

    async fn list_pipelines(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT pipeline_name
            FROM executions
            ORDER BY pipeline_name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list pipelines")?;

        rows.iter()
            .map(|row| row.try_get("pipeline_name").map_err(Into::into))
            .collect()
    }
}
