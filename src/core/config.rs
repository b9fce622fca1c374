//! Pipeline configuration from YAML

use crate::core::error::PipelineError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Default name of the options block used by the final analysis
pub const DEFAULT_ANALYSIS_STAGE: &str = "deseq";

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name, used for run history
    #[serde(default = "default_pipeline_name")]
    pub name: String,

    /// Named output directories (`data` and `results` are required)
    pub dir: BTreeMap<String, PathBuf>,

    /// Stage name -> stage options
    pub stage: BTreeMap<String, StageOptions>,

    /// Ordered stage names to execute for every condition
    pub run: Vec<String>,

    /// Ordered condition identifiers (one input directory each)
    pub input_dirs: Vec<String>,

    /// Reference data for alignment-like stages
    #[serde(rename = "ref")]
    pub reference: Mapping,

    /// Worker pool settings
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// Regex a file name must match to be picked up as input
    #[serde(default)]
    pub input_pattern: Option<String>,

    /// Cross-condition combine settings
    #[serde(default)]
    pub combine: CombineConfig,
}

/// Options of a single stage as defined in YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageOptions {
    /// External program implementing the stage (defaults to the stage name)
    #[serde(default)]
    pub program: Option<String>,

    /// Argument template for the external program
    #[serde(default)]
    pub args: Option<Vec<String>>,

    /// Output directory name under the condition results directory
    #[serde(default)]
    pub out_dir: Option<String>,

    /// Stage-specific options, passed through to the handler untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl StageOptions {
    /// Program to run, falling back to the stage name
    pub fn program_or<'a>(&'a self, stage_name: &'a str) -> &'a str {
        self.program.as_deref().unwrap_or(stage_name)
    }

    /// Look up a pass-through option
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Render a pass-through option as a plain string (scalars only)
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(scalar_to_string)
    }
}

/// Worker pool configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Number of concurrent work items (defaults to available parallelism)
    #[serde(default)]
    pub cores: Option<usize>,

    /// Deadline for a whole map call, in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Combine step configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CombineConfig {
    /// Stage whose outputs are combined across conditions
    #[serde(default)]
    pub stage: Option<String>,

    /// Options block configuring the final analysis
    #[serde(default)]
    pub analysis: Option<String>,

    /// Output directory under `results`
    #[serde(default)]
    pub out_dir: Option<String>,
}

impl CombineConfig {
    pub fn analysis_stage(&self) -> &str {
        self.analysis.as_deref().unwrap_or(DEFAULT_ANALYSIS_STAGE)
    }

    pub fn out_dir_name(&self) -> &str {
        self.out_dir.as_deref().unwrap_or("deseq")
    }
}

fn default_pipeline_name() -> String {
    "pipeline".to_string()
}

/// Render a scalar YAML value the way it would be written on a command line
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, PipelineError> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)
            .map_err(|e| PipelineError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<(), PipelineError> {
        for key in ["data", "results"] {
            if !self.dir.contains_key(key) {
                return Err(PipelineError::config(format!("missing required key dir.{}", key)));
            }
        }

        // Every stage in `run` must be configured
        let mut seen = HashSet::new();
        for name in &self.run {
            if !self.stage.contains_key(name) {
                return Err(PipelineError::config(format!(
                    "stage '{}' is listed in run but has no entry in stage",
                    name
                )));
            }
            if !seen.insert(name) {
                return Err(PipelineError::config(format!("stage '{}' is listed twice in run", name)));
            }
        }

        if self.input_dirs.is_empty() {
            return Err(PipelineError::config("input_dirs must list at least one condition"));
        }
        let mut seen = HashSet::new();
        for condition in &self.input_dirs {
            if !seen.insert(condition) {
                return Err(PipelineError::config(format!(
                    "condition '{}' is listed twice in input_dirs",
                    condition
                )));
            }
        }

        if let Some(ref stage) = self.combine.stage {
            if !self.run.contains(stage) {
                return Err(PipelineError::config(format!(
                    "combine.stage '{}' is not listed in run",
                    stage
                )));
            }
        }

        if let Some(cores) = self.cluster.cores {
            if cores == 0 {
                return Err(PipelineError::config("cluster.cores must be at least 1"));
            }
        }

        self.input_regex()?;

        Ok(())
    }

    /// Options for a stage, or a configuration error naming it
    pub fn stage_options(&self, stage_name: &str) -> Result<&StageOptions, PipelineError> {
        self.stage.get(stage_name).ok_or_else(|| {
            PipelineError::config(format!("no configuration for stage '{}'", stage_name))
        })
    }

    pub fn data_dir(&self) -> &Path {
        self.dir.get("data").map(PathBuf::as_path).unwrap_or(Path::new("data"))
    }

    pub fn results_dir(&self) -> &Path {
        self.dir
            .get("results")
            .map(PathBuf::as_path)
            .unwrap_or(Path::new("results"))
    }

    /// Compiled input file name filter, if configured
    pub fn input_regex(&self) -> Result<Option<Regex>, PipelineError> {
        self.input_pattern
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| {
                    PipelineError::config(format!("invalid input_pattern '{}': {}", pattern, e))
                })
            })
            .transpose()
    }

    /// Reference data as a flat string map (scalars only), keyed `ref.<name>`
    pub fn reference_vars(&self) -> BTreeMap<String, String> {
        self.reference
            .iter()
            .filter_map(|(k, v)| {
                let key = k.as_str()?;
                scalar_to_string(v).map(|value| (format!("ref.{}", key), value))
            })
            .collect()
    }
}
