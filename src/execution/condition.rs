//! Per-condition loop - runs the stage sequence over one condition's inputs

use crate::{
    core::{fileset::ensure_dir, ConditionContext, FileSet, Pipeline, PipelineError},
    execution::{
        engine::{EventBus, ExecutionEvent},
        StageRunner,
    },
};
use tracing::{info, warn};

/// What one condition produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionOutcome {
    pub condition: String,
    /// Active file set after the last stage
    pub terminal: FileSet,
    /// Output of the countable stage, if it ran
    pub countable: Option<FileSet>,
    pub stages_run: usize,
}

/// A condition failure, with the stage that was running (if any)
#[derive(Debug)]
pub struct ConditionFailure {
    pub condition: String,
    pub stage: Option<String>,
    pub error: PipelineError,
}

/// Runs the ordered stages of `run` for one condition at a time
pub struct ConditionLoop<'a> {
    runner: &'a StageRunner,
    events: &'a EventBus,
}

impl<'a> ConditionLoop<'a> {
    pub fn new(runner: &'a StageRunner, events: &'a EventBus) -> Self {
        Self { runner, events }
    }

    /// Run every stage for `condition`, threading the file set through
    ///
    /// `countable_stage` names the stage whose outputs are kept for aggregation.
    pub async fn run(
        &self,
        pipeline: &Pipeline,
        condition: &str,
        countable_stage: Option<&str>,
    ) -> Result<ConditionOutcome, ConditionFailure> {
        let fail = |stage: Option<&str>, error: PipelineError| ConditionFailure {
            condition: condition.to_string(),
            stage: stage.map(str::to_string),
            error,
        };

        let ctx: ConditionContext = pipeline.condition_context(condition);
        ensure_dir(ctx.results_dir()).await.map_err(|e| fail(None, e))?;

        let filter = pipeline.config.input_regex().map_err(|e| fail(None, e))?;
        let mut curr_files = FileSet::from_dir(&ctx.input_dir, filter.as_ref())
            .await
            .map_err(|e| fail(None, e))?;

        if curr_files.is_empty() {
            warn!(
                "Condition {} has no input files in {}",
                condition,
                ctx.input_dir.display()
            );
            self.events
                .emit(ExecutionEvent::ConditionEmpty {
                    condition: condition.to_string(),
                    input_dir: ctx.input_dir.clone(),
                })
                .await;
        } else {
            info!("Condition {}: {} input files", condition, curr_files.len());
        }

        let mut countable = None;
        let mut stages_run = 0;
        for stage in pipeline.stages() {
            self.events
                .emit(ExecutionEvent::StageStarted {
                    condition: condition.to_string(),
                    stage: stage.clone(),
                    items: curr_files.len(),
                })
                .await;

            curr_files = match self.runner.run_stage(stage, &curr_files, &ctx).await {
                Ok(files) => files,
                Err(error) => {
                    self.events
                        .emit(ExecutionEvent::StageFailed {
                            condition: condition.to_string(),
                            stage: stage.clone(),
                            error: error.to_string(),
                        })
                        .await;
                    return Err(fail(Some(stage), error));
                }
            };
            stages_run += 1;

            self.events
                .emit(ExecutionEvent::StageCompleted {
                    condition: condition.to_string(),
                    stage: stage.clone(),
                    outputs: curr_files.len(),
                })
                .await;

            if countable_stage == Some(stage.as_str()) {
                countable = Some(curr_files.clone());
            }
        }

        Ok(ConditionOutcome {
            condition: condition.to_string(),
            terminal: curr_files,
            countable,
            stages_run,
        })
    }
}
