//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall pipeline execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Pipeline has not started
    Pending,
    /// Pipeline is currently running
    Running,
    /// Pipeline completed successfully
    Completed,
    /// Pipeline failed
    Failed,
}

/// Phase of the pipeline driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverPhase {
    /// Validating and creating top-level directories
    Initializing,
    /// Running the stage sequence of one condition
    PerConditionRunning { index: usize, condition: String },
    /// Combining terminal outputs across conditions
    Aggregating,
    /// Run finished successfully
    Done,
    /// Run aborted
    Failed {
        condition: Option<String>,
        stage: Option<String>,
        error: String,
    },
}

impl DriverPhase {
    /// Check if the phase is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, DriverPhase::Done | DriverPhase::Failed { .. })
    }
}

/// Overall pipeline state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    /// Unique execution ID
    pub execution_id: Uuid,

    /// Current execution status
    pub status: ExecutionStatus,

    /// Current driver phase
    pub phase: DriverPhase,

    /// When execution started
    pub started_at: Option<DateTime<Utc>>,

    /// When execution completed/failed
    pub completed_at: Option<DateTime<Utc>>,

    /// Total number of conditions
    pub total_conditions: usize,

    /// Number of conditions whose stage sequence finished
    pub completed_conditions: usize,

    /// Number of stage runs finished across all conditions
    pub stages_run: usize,
}

impl PipelineState {
    /// Create a new pipeline state
    pub fn new() -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            status: ExecutionStatus::Pending,
            phase: DriverPhase::Initializing,
            started_at: None,
            completed_at: None,
            total_conditions: 0,
            completed_conditions: 0,
            stages_run: 0,
        }
    }

    /// Mark pipeline as started
    pub fn start(&mut self, total_conditions: usize) {
        self.status = ExecutionStatus::Running;
        self.phase = DriverPhase::Initializing;
        self.started_at = Some(Utc::now());
        self.total_conditions = total_conditions;
    }

    /// Enter the stage sequence of a condition
    pub fn enter_condition(&mut self, index: usize, condition: &str) {
        self.phase = DriverPhase::PerConditionRunning {
            index,
            condition: condition.to_string(),
        };
    }

    pub fn enter_aggregation(&mut self) {
        self.phase = DriverPhase::Aggregating;
    }

    /// Mark pipeline as completed
    pub fn complete(&mut self) {
        self.status = ExecutionStatus::Completed;
        self.phase = DriverPhase::Done;
        self.completed_at = Some(Utc::now());
    }

    /// Mark pipeline as failed
    pub fn fail(&mut self, condition: Option<String>, stage: Option<String>, error: String) {
        self.status = ExecutionStatus::Failed;
        self.phase = DriverPhase::Failed {
            condition,
            stage,
            error,
        };
        self.completed_at = Some(Utc::now());
    }

    /// Calculate progress percentage (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_conditions == 0 {
            return 0.0;
        }
        self.completed_conditions as f64 / self.total_conditions as f64
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}
