//! Condition context - the per-condition view of the configuration

use crate::core::config::PipelineConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Execution context for one condition
///
/// Built fresh for every condition and shared read-only by all work items of
/// that condition. The underlying configuration is never mutated.
#[derive(Debug, Clone)]
pub struct ConditionContext {
    /// Condition identifier (an entry of `input_dirs`)
    pub condition: String,

    /// Condition-scoped results directory (`results/<condition>`)
    pub results_dir: PathBuf,

    /// Condition input directory (`data/<condition>`)
    pub input_dir: PathBuf,

    /// The global configuration
    pub config: Arc<PipelineConfig>,
}

impl ConditionContext {
    /// Create the context for `condition`
    pub fn new(config: Arc<PipelineConfig>, condition: &str) -> Self {
        Self {
            condition: condition.to_string(),
            results_dir: config.results_dir().join(condition),
            input_dir: config.data_dir().join(condition),
            config,
        }
    }

    /// Directory a stage writes into
    pub fn stage_dir(&self, dir_name: &str) -> PathBuf {
        self.results_dir.join(dir_name)
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Variables available for rendering command templates
    pub fn get_rendering_variables(&self) -> HashMap<String, String> {
        let mut vars: HashMap<String, String> = self.config.reference_vars().into_iter().collect();

        for (name, dir) in &self.config.dir {
            vars.insert(format!("dir.{}", name), dir.display().to_string());
        }

        vars.insert("condition".to_string(), self.condition.clone());
        vars.insert("results".to_string(), self.results_dir.display().to_string());

        vars
    }
}

/// Replace `{{ name }}` placeholders in `template`
///
/// Substitution is a single left-to-right pass: substituted values are never
/// rescanned, and unknown placeholders are kept verbatim.
pub fn render_template(template: &str, variables: &HashMap<String, String>) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start + 2..].find("}}") else {
            break;
        };
        let end = start + 2 + len + 2;
        rendered.push_str(&rest[..start]);
        match variables.get(rest[start + 2..end - 2].trim()) {
            Some(value) => rendered.push_str(value),
            None => rendered.push_str(&rest[start..end]),
        }
        rest = &rest[end..];
    }

    rendered.push_str(rest);
    rendered
}
