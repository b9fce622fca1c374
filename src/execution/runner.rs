//! Stage runner - runs one stage over the active file set

use crate::{
    core::{
        fileset::{derived_output, ensure_dir},
        ConditionContext, FileSet, MapError, PipelineError, StageArgs, StageOutput, StageSpec,
        WorkItem,
    },
    execution::{registry::StageRegistry, MapExecutor},
    handler::HandlerError,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Runs single stages: builds work items, maps them, collects outputs
#[derive(Debug, Clone)]
pub struct StageRunner {
    registry: Arc<StageRegistry>,
    executor: MapExecutor,
}

impl StageRunner {
    pub fn new(registry: Arc<StageRegistry>, executor: MapExecutor) -> Self {
        Self { registry, executor }
    }

    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    /// Run `stage_name` over `curr_files` and return the next active file set
    ///
    /// Non-chaining stages return `curr_files` unchanged.
    pub async fn run_stage(
        &self,
        stage_name: &str,
        curr_files: &FileSet,
        ctx: &ConditionContext,
    ) -> Result<FileSet, PipelineError> {
        let options = ctx.config.stage_options(stage_name)?;
        let descriptor = self.registry.resolve(stage_name)?;
        let spec = StageSpec {
            name: stage_name.to_string(),
            kind: descriptor.kind,
            options: options.clone(),
        };
        let naming = spec.kind.naming();
        let chains = spec.kind.chains();

        let out_dir = ctx.stage_dir(spec.out_dir_name());
        ensure_dir(&out_dir).await?;

        let args = Arc::new(StageArgs::build(spec.kind, stage_name, options, ctx)?);

        let items: Vec<WorkItem> = curr_files
            .iter()
            .enumerate()
            .map(|(index, input)| WorkItem {
                index,
                input: input.clone(),
                out_dir: out_dir.clone(),
                output: chains
                    .then(|| derived_output(input, &out_dir, naming.suffix, naming.extension)),
            })
            .collect();

        info!(
            "Running {} ({}) on {} files for condition {}",
            stage_name,
            spec.kind,
            items.len(),
            ctx.condition
        );

        let stage_error = |source: MapError| PipelineError::StageExecution {
            condition: ctx.condition.clone(),
            stage: stage_name.to_string(),
            input: source
                .index()
                .and_then(|i| curr_files.as_slice().get(i).cloned()),
            source,
        };

        let handler = descriptor.handler.clone();
        let outputs = self
            .executor
            .map(items, args, move |_, item, args| {
                let handler = handler.clone();
                async move { handler.run(&item, &args).await }
            })
            .await
            .map_err(stage_error)?;

        let mut files = Vec::with_capacity(outputs.len());
        for (index, output) in outputs.into_iter().enumerate() {
            match (chains, output) {
                (true, StageOutput::File(path)) => files.push(path),
                (false, StageOutput::Report(report)) => {
                    debug!("{} report for item {}: {} bytes", stage_name, index, report.len());
                }
                (true, StageOutput::Report(_)) => {
                    return Err(stage_error(MapError::Item {
                        index,
                        source: HandlerError::UnexpectedOutput(
                            "report returned by a file-producing stage".to_string(),
                        ),
                    }));
                }
                (false, StageOutput::File(path)) => {
                    return Err(stage_error(MapError::Item {
                        index,
                        source: HandlerError::UnexpectedOutput(format!(
                            "file {} returned by a report-only stage",
                            path.display()
                        )),
                    }));
                }
            }
        }

        if chains {
            Ok(FileSet::new(files))
        } else {
            Ok(curr_files.clone())
        }
    }
}
