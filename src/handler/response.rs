//! Handler error types

use std::path::PathBuf;
use thiserror::Error;

/// Error types for handler invocations
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with code {code}: {stderr}")]
    Exit {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("timeout after {0} seconds")]
    Timeout(u64),

    #[error("handler reported success but {} does not exist", .0.display())]
    MissingOutput(PathBuf),

    #[error("unexpected handler output: {0}")]
    UnexpectedOutput(String),

    #[error("{0}")]
    Failed(String),
}
