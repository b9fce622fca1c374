//! Error kinds raised by the pipeline core

use crate::handler::HandlerError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing key, unknown stage, or an otherwise unusable configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// A per-item handler invocation failed, failing the whole stage
    #[error("stage '{stage}' failed for condition '{condition}'{}: {source}", input_suffix(.input))]
    StageExecution {
        condition: String,
        stage: String,
        input: Option<PathBuf>,
        #[source]
        source: MapError,
    },

    /// The final cross-condition analysis failed
    #[error("analysis '{stage}' failed: {source}")]
    Analysis {
        stage: String,
        #[source]
        source: HandlerError,
    },

    /// Zero items where at least one is required
    #[error("no input for {what}")]
    EmptyInput { what: String },

    /// The combine step was handed inconsistent data
    #[error("aggregation invariant violated: {0}")]
    AggregationInvariant(AggregationError),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn input_suffix(input: &Option<PathBuf>) -> String {
    match input {
        Some(path) => format!(" on {}", path.display()),
        None => String::new(),
    }
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        PipelineError::Config(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Why the aggregator refused to combine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregationError {
    #[error("condition '{0}' produced no files to combine")]
    EmptyCondition(String),

    #[error("combined column '{0}' appears more than once")]
    DuplicateColumn(String),

    #[error("{labels} labels for {files} files")]
    LengthMismatch { labels: usize, files: usize },
}

/// Failure of a single distributed map call
#[derive(Debug, Error)]
pub enum MapError {
    #[error("item {index} failed: {source}")]
    Item {
        index: usize,
        #[source]
        source: HandlerError,
    },

    #[error("item {index} panicked")]
    Panicked { index: usize },

    #[error("map call exceeded its deadline of {0:?}")]
    DeadlineExceeded(std::time::Duration),

    #[error("cluster has been stopped")]
    ClusterStopped,
}

impl MapError {
    /// Index of the failing item, when one item is to blame
    pub fn index(&self) -> Option<usize> {
        match self {
            MapError::Item { index, .. } | MapError::Panicked { index } => Some(*index),
            _ => None,
        }
    }
}
