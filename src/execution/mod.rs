//! Pipeline execution engine

pub mod aggregate;
pub mod cluster;
pub mod condition;
pub mod engine;
pub mod executor;
pub mod registry;
pub mod runner;

pub use aggregate::{AggregationRecord, Aggregator, CombineOutput};
pub use cluster::{start_cluster, ClusterHandle};
pub use condition::{ConditionFailure, ConditionLoop, ConditionOutcome};
pub use engine::{EventBus, EventHandler, ExecutionEngine, ExecutionEvent, RunSummary};
pub use executor::MapExecutor;
pub use registry::{StageDescriptor, StageRegistry};
pub use runner::StageRunner;
