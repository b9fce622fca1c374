//! Pipeline domain model

use crate::core::{
    config::PipelineConfig,
    context::ConditionContext,
    state::{ExecutionStatus, PipelineState},
};
use std::sync::Arc;

/// A loaded pipeline and its run state
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Shared, read-only configuration
    pub config: Arc<PipelineConfig>,

    /// Execution state
    pub state: PipelineState,
}

impl Pipeline {
    /// Create a pipeline from configuration
    pub fn from_config(config: PipelineConfig) -> Self {
        Self::from_shared(Arc::new(config))
    }

    pub fn from_shared(config: Arc<PipelineConfig>) -> Self {
        Pipeline {
            name: config.name.clone(),
            config,
            state: PipelineState::new(),
        }
    }

    /// Condition identifiers in run order
    pub fn conditions(&self) -> &[String] {
        &self.config.input_dirs
    }

    /// Stage names in run order
    pub fn stages(&self) -> &[String] {
        &self.config.run
    }

    /// Fresh context for one condition
    pub fn condition_context(&self, condition: &str) -> ConditionContext {
        ConditionContext::new(self.config.clone(), condition)
    }

    /// Check if pipeline finished successfully
    pub fn is_complete(&self) -> bool {
        self.state.status == ExecutionStatus::Completed
    }

    /// Check if pipeline has failed
    pub fn has_failed(&self) -> bool {
        self.state.status == ExecutionStatus::Failed
    }
}
