//! Stage registry - maps stage names to typed stage descriptors

use crate::core::{config::StageOptions, PipelineConfig, PipelineError, StageKind};
use crate::handler::{CommandHandler, StageHandler};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// What the runner needs to dispatch a stage
#[derive(Clone)]
pub struct StageDescriptor {
    /// Argument-building rule
    pub kind: StageKind,
    /// Per-item worker
    pub handler: Arc<dyn StageHandler>,
}

impl fmt::Debug for StageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageDescriptor")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Dispatch table from stage name to descriptor
#[derive(Debug, Clone, Default)]
pub struct StageRegistry {
    stages: HashMap<String, StageDescriptor>,
}

/// Resolve the kind of a stage from its name or an explicit `kind` option
pub fn kind_for(stage_name: &str, options: Option<&StageOptions>) -> Option<StageKind> {
    if let Some(value) = options.and_then(|o| o.get("kind")) {
        return serde_yaml::from_value(value.clone()).ok();
    }
    StageKind::ALL
        .into_iter()
        .find(|kind| kind.name() == stage_name || kind.tool_alias() == stage_name)
}

impl StageRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for a stage name
    pub fn register<H>(&mut self, name: impl Into<String>, kind: StageKind, handler: H) -> &mut Self
    where
        H: StageHandler + 'static,
    {
        self.register_arc(name, kind, Arc::new(handler))
    }

    pub fn register_arc(
        &mut self,
        name: impl Into<String>,
        kind: StageKind,
        handler: Arc<dyn StageHandler>,
    ) -> &mut Self {
        self.stages.insert(name.into(), StageDescriptor { kind, handler });
        self
    }

    /// Registry running every configured stage of `run` as an external command
    pub fn with_command_handlers(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let mut registry = Self::new();
        for name in &config.run {
            let options = config.stage_options(name)?;
            let kind = kind_for(name, Some(options)).ok_or_else(|| {
                PipelineError::config(format!(
                    "stage '{}' has no known kind; name it after a stage kind or set `kind` ({})",
                    name,
                    known_kinds()
                ))
            })?;
            registry.register(name.clone(), kind, CommandHandler::from_options(name, options)?);
        }
        Ok(registry)
    }

    /// Look up a stage by name
    pub fn resolve(&self, name: &str) -> Result<&StageDescriptor, PipelineError> {
        self.stages
            .get(name)
            .ok_or_else(|| PipelineError::config(format!("no handler registered for stage '{}'", name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stages.contains_key(name)
    }

    /// Check every stage of `run` up front
    ///
    /// An explicit `combine.stage` must produce files; report-only stages pass
    /// their inputs through and have nothing to combine.
    pub fn validate(&self, config: &PipelineConfig) -> Result<(), PipelineError> {
        for name in &config.run {
            config.stage_options(name)?;
            self.resolve(name)?;
        }
        if let Some(ref stage) = config.combine.stage {
            let kind = self.resolve(stage)?.kind;
            if !kind.chains() {
                return Err(PipelineError::config(format!(
                    "combine.stage '{}' is a {} stage and produces no files to combine",
                    stage, kind
                )));
            }
        }
        Ok(())
    }

    /// Name of the stage the aggregator combines, if any stage of `run` qualifies
    pub fn countable_stage<'a>(&self, config: &'a PipelineConfig) -> Option<&'a str> {
        if let Some(ref stage) = config.combine.stage {
            return Some(stage.as_str());
        }
        config
            .run
            .iter()
            .rev()
            .find(|name| {
                self.stages
                    .get(name.as_str())
                    .is_some_and(|d| d.kind == StageKind::Count)
            })
            .map(String::as_str)
    }
}

fn known_kinds() -> String {
    StageKind::ALL
        .iter()
        .map(|k| format!("{}/{}", k.name(), k.tool_alias()))
        .collect::<Vec<_>>()
        .join(", ")
}
