//! Stage handlers - the per-file workers the pipeline dispatches to

pub mod command;
pub mod response;

use crate::core::{StageArgs, StageOutput, WorkItem};
use async_trait::async_trait;
use std::path::PathBuf;

pub use command::{CommandAnalysis, CommandHandler, CommandRunner};
pub use response::HandlerError;

/// Trait for stage execution - allows for different implementations
///
/// Implementations must be safe to call concurrently for different items.
#[async_trait]
pub trait StageHandler: Send + Sync {
    /// Process one work item with the stage's shared arguments
    async fn run(&self, item: &WorkItem, args: &StageArgs) -> Result<StageOutput, HandlerError>;
}

/// Input of the final cross-condition analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    /// Combined count table
    pub combined: PathBuf,
    /// Condition label of each combined column, in column order
    pub labels: Vec<String>,
    /// Where the analysis writes its result
    pub output: PathBuf,
}

/// Trait for the final analysis run once over all conditions
#[async_trait]
pub trait AnalysisHandler: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<(), HandlerError>;
}

/// Analysis handler that does nothing (for pipelines without a final model)
#[derive(Debug, Clone, Default)]
pub struct NoAnalysis;

#[async_trait]
impl AnalysisHandler for NoAnalysis {
    async fn analyze(&self, _request: &AnalysisRequest) -> Result<(), HandlerError> {
        Ok(())
    }
}
