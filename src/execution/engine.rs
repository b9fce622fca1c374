//! Main execution engine - drives conditions in order, then aggregates

use crate::{
    core::{fileset::ensure_dir, ExecutionStatus, FileSet, Pipeline, PipelineError},
    execution::{
        aggregate::{Aggregator, CombineOutput},
        cluster::ClusterHandle,
        condition::{ConditionLoop, ConditionOutcome},
        registry::StageRegistry,
        MapExecutor, StageRunner,
    },
    handler::AnalysisHandler,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

/// Events that can occur during pipeline execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        execution_id: Uuid,
        pipeline_name: String,
        conditions: usize,
        stages: usize,
    },
    ConditionStarted {
        condition: String,
        index: usize,
    },
    ConditionEmpty {
        condition: String,
        input_dir: PathBuf,
    },
    StageStarted {
        condition: String,
        stage: String,
        items: usize,
    },
    StageCompleted {
        condition: String,
        stage: String,
        outputs: usize,
    },
    StageFailed {
        condition: String,
        stage: String,
        error: String,
    },
    ConditionCompleted {
        condition: String,
        files: usize,
    },
    AggregationStarted {
        stage: String,
        conditions: usize,
    },
    AggregationSkipped,
    AggregationCompleted {
        combined: PathBuf,
        analysis_output: PathBuf,
    },
    PipelineCompleted {
        execution_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Fan-out of execution events to registered handlers
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl EventBus {
    pub async fn subscribe<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.handlers.lock().await.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    pub async fn emit(&self, event: ExecutionEvent) {
        let handlers = self.handlers.lock().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub execution_id: Uuid,
    pub conditions: Vec<ConditionOutcome>,
    /// `None` when no stage of `run` produces countable output
    pub combine: Option<CombineOutput>,
}

/// Main pipeline execution engine
pub struct ExecutionEngine {
    runner: StageRunner,
    analysis: Arc<dyn AnalysisHandler>,
    events: EventBus,
}

impl ExecutionEngine {
    pub fn new(
        registry: StageRegistry,
        cluster: ClusterHandle,
        analysis: Arc<dyn AnalysisHandler>,
    ) -> Self {
        Self {
            runner: StageRunner::new(Arc::new(registry), MapExecutor::new(cluster)),
            analysis,
            events: EventBus::default(),
        }
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(handler).await;
    }

    async fn emit_event(&self, event: ExecutionEvent) {
        self.events.emit(event).await;
    }

    /// Execute the entire pipeline
    ///
    /// Conditions run one after another; within a condition each stage is
    /// fanned out over its files. Any failure aborts the run and is recorded
    /// in `pipeline.state` with the condition and stage where it happened.
    pub async fn execute(&self, pipeline: &mut Pipeline) -> Result<RunSummary, PipelineError> {
        let execution_id = pipeline.state.execution_id;
        info!("Starting pipeline execution: {} ({})", pipeline.name, execution_id);

        pipeline.state.start(pipeline.conditions().len());
        self.emit_event(ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name: pipeline.name.clone(),
            conditions: pipeline.conditions().len(),
            stages: pipeline.stages().len(),
        })
        .await;

        if let Err(e) = self.initialize(pipeline).await {
            return Err(self.abort(pipeline, None, None, e).await);
        }

        let countable_stage = self
            .runner
            .registry()
            .countable_stage(&pipeline.config)
            .map(str::to_string);

        let condition_loop = ConditionLoop::new(&self.runner, &self.events);
        let conditions = pipeline.conditions().to_vec();
        let mut outcomes = Vec::with_capacity(conditions.len());

        for (index, condition) in conditions.iter().enumerate() {
            pipeline.state.enter_condition(index, condition);
            self.emit_event(ExecutionEvent::ConditionStarted {
                condition: condition.clone(),
                index,
            })
            .await;

            match condition_loop
                .run(pipeline, condition, countable_stage.as_deref())
                .await
            {
                Ok(outcome) => {
                    pipeline.state.completed_conditions += 1;
                    pipeline.state.stages_run += outcome.stages_run;
                    self.emit_event(ExecutionEvent::ConditionCompleted {
                        condition: condition.clone(),
                        files: outcome.terminal.len(),
                    })
                    .await;
                    outcomes.push(outcome);
                }
                Err(failure) => {
                    pipeline.state.stages_run += pipeline
                        .stages()
                        .iter()
                        .position(|s| Some(s) == failure.stage.as_ref())
                        .unwrap_or(0);
                    return Err(self
                        .abort(pipeline, Some(failure.condition), failure.stage, failure.error)
                        .await);
                }
            }
        }

        let combine = match countable_stage {
            Some(stage) => {
                pipeline.state.enter_aggregation();
                self.emit_event(ExecutionEvent::AggregationStarted {
                    stage: stage.clone(),
                    conditions: outcomes.len(),
                })
                .await;

                let per_condition: Vec<(String, FileSet)> = outcomes
                    .iter()
                    .map(|o| (o.condition.clone(), o.countable.clone().unwrap_or_default()))
                    .collect();

                let combine = &pipeline.config.combine;
                let aggregator = Aggregator::new(
                    pipeline.config.results_dir().join(combine.out_dir_name()),
                    combine.analysis_stage(),
                    self.analysis.clone(),
                );
                match aggregator.combine(&per_condition).await {
                    Ok(output) => {
                        self.emit_event(ExecutionEvent::AggregationCompleted {
                            combined: output.combined.clone(),
                            analysis_output: output.analysis_output.clone(),
                        })
                        .await;
                        Some(output)
                    }
                    Err(e) => {
                        let failed_stage = match e {
                            PipelineError::Analysis { ref stage, .. } => stage.clone(),
                            _ => stage,
                        };
                        return Err(self.abort(pipeline, None, Some(failed_stage), e).await);
                    }
                }
            }
            None => {
                info!("No countable stage in run; skipping aggregation");
                self.emit_event(ExecutionEvent::AggregationSkipped).await;
                None
            }
        };

        pipeline.state.complete();
        info!("Pipeline execution finished: {} - Completed", pipeline.name);
        self.emit_event(ExecutionEvent::PipelineCompleted {
            execution_id,
            status: ExecutionStatus::Completed,
        })
        .await;

        Ok(RunSummary {
            execution_id,
            conditions: outcomes,
            combine,
        })
    }

    /// Validate stages and create the configured top-level directories
    async fn initialize(&self, pipeline: &Pipeline) -> Result<(), PipelineError> {
        if pipeline.conditions().is_empty() {
            return Err(PipelineError::EmptyInput {
                what: "pipeline (input_dirs is empty)".to_string(),
            });
        }
        self.runner.registry().validate(&pipeline.config)?;
        for dir in pipeline.config.dir.values() {
            ensure_dir(dir).await?;
        }
        Ok(())
    }

    async fn abort(
        &self,
        pipeline: &mut Pipeline,
        condition: Option<String>,
        stage: Option<String>,
        e: PipelineError,
    ) -> PipelineError {
        error!("Pipeline {} failed: {}", pipeline.name, e);
        pipeline.state.fail(condition, stage, e.to_string());
        self.emit_event(ExecutionEvent::PipelineCompleted {
            execution_id: pipeline.state.execution_id,
            status: ExecutionStatus::Failed,
        })
        .await;
        e
    }
}
