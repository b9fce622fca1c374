//! seqflow - run a staged sequencing pipeline over every condition, then combine counts

pub mod cli;
pub mod core;
pub mod execution;
pub mod handler;
pub mod persistence;

// Re-export commonly used types
pub use core::{
    ConditionContext, ExecutionStatus, FileSet, Pipeline, PipelineConfig, PipelineError, StageArgs,
    StageKind, StageOutput, WorkItem,
};
pub use execution::{
    start_cluster, ClusterHandle, ExecutionEngine, ExecutionEvent, MapExecutor, RunSummary,
    StageRegistry,
};
pub use handler::{AnalysisHandler, AnalysisRequest, HandlerError, StageHandler};
