//! Core domain models for the pipeline
//!
//! This module defines the configuration, the per-condition context, file
//! sets, stage argument shapes, the pipeline value, run state, and the error kinds.

pub mod config;
pub mod context;
pub mod error;
pub mod fileset;
pub mod pipeline;
pub mod stage;
pub mod state;

pub use config::PipelineConfig;
pub use context::ConditionContext;
pub use error::{AggregationError, MapError, PipelineError};
pub use fileset::FileSet;
pub use pipeline::Pipeline;
pub use stage::*;
pub use state::*;
