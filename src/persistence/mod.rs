//! Persistence layer for pipeline run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteExecutionStore;

pub use crate::core::ExecutionStatus;
use crate::core::{DriverPhase, Pipeline};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Summary of a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSummary {
    /// Unique execution ID
    pub execution_id: Uuid,

    /// Pipeline name
    pub pipeline_name: String,

    /// Execution status
    pub status: ExecutionStatus,

    /// When execution started
    pub started_at: DateTime<Utc>,

    /// When execution completed (if complete)
    pub completed_at: Option<DateTime<Utc>>,

    /// Progress (0.0 to 1.0)
    pub progress: f64,

    /// Number of conditions whose stages all finished
    pub completed_conditions: usize,

    /// Total number of conditions
    pub total_conditions: usize,

    /// Stage runs finished across all conditions
    pub stages_run: usize,

    /// Where a failed run stopped
    #[serde(default)]
    pub failed_condition: Option<String>,

    #[serde(default)]
    pub failed_stage: Option<String>,

    #[serde(default)]
    pub error: Option<String>,
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save a pipeline execution
    async fn save_execution(&self, execution: &ExecutionSummary) -> Result<()>;

    /// Load an execution by ID
    async fn load_execution(&self, execution_id: Uuid) -> Result<Option<ExecutionSummary>>;

    /// List all executions for a pipeline
    async fn list_executions(&self, pipeline_name: &str) -> Result<Vec<ExecutionSummary>>;

    /// List all pipeline names
    async fn list_pipelines(&self) -> Result<Vec<String>>;
}

/// In-memory persistence (for testing or `--no-history` runs)
#[derive(Default)]
pub struct InMemoryPersistence {
    executions: RwLock<HashMap<Uuid, ExecutionSummary>>,
    by_pipeline: RwLock<HashMap<String, Vec<Uuid>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_execution(&self, execution: &ExecutionSummary) -> Result<()> {
        let mut execs = self.executions.write().await;
        let is_new = execs
            .insert(execution.execution_id, execution.clone())
            .is_none();

        if is_new {
            let mut by_pipeline = self.by_pipeline.write().await;
            by_pipeline
                .entry(execution.pipeline_name.clone())
                .or_default()
                .push(execution.execution_id);
        }

        Ok(())
    }

    async fn load_execution(&self, execution_id: Uuid) -> Result<Option<ExecutionSummary>> {
        let execs = self.executions.read().await;
        Ok(execs.get(&execution_id).cloned())
    }

    async fn list_executions(&self, pipeline_name: &str) -> Result<Vec<ExecutionSummary>> {
        let execs = self.executions.read().await;
        let by_pipeline = self.by_pipeline.read().await;

        Ok(by_pipeline
            .get(pipeline_name)
            .map(|ids| ids.iter().filter_map(|id| execs.get(id).cloned()).collect())
            .unwrap_or_default())
    }

    async fn list_pipelines(&self) -> Result<Vec<String>> {
        let by_pipeline = self.by_pipeline.read().await;
        let mut names: Vec<String> = by_pipeline.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// Create a summary from a pipeline
pub fn create_summary(pipeline: &Pipeline) -> ExecutionSummary {
    let (failed_condition, failed_stage, error) = match &pipeline.state.phase {
        DriverPhase::Failed {
            condition,
            stage,
            error,
        } => (condition.clone(), stage.clone(), Some(error.clone())),
        _ => (None, None, None),
    };

    ExecutionSummary {
        execution_id: pipeline.state.execution_id,
        pipeline_name: pipeline.name.clone(),
        status: pipeline.state.status,
        started_at: pipeline.state.started_at.unwrap_or_else(Utc::now),
        completed_at: pipeline.state.completed_at,
        progress: pipeline.state.progress(),
        completed_conditions: pipeline.state.completed_conditions,
        total_conditions: pipeline.state.total_conditions,
        stages_run: pipeline.state.stages_run,
        failed_condition,
        failed_stage,
        error,
    }
}
