//! External command handlers - run a configured program per work item

use crate::core::{
    config::{scalar_to_string, PipelineConfig, StageOptions},
    context::render_template,
    PipelineError, StageArgs, StageOutput, WorkItem,
};
use crate::handler::{AnalysisHandler, AnalysisRequest, HandlerError, StageHandler};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Runs a single external program and captures its stdout
#[derive(Debug, Clone)]
pub struct CommandRunner {
    /// Path or name of the executable
    program: String,

    /// Timeout for one invocation in seconds
    timeout_secs: Option<u64>,
}

impl CommandRunner {
    /// Create a new runner
    ///
    /// # Arguments
    /// * `program` - Executable name or path (e.g., "sickle", "/opt/bin/tophat")
    /// * `timeout_secs` - Optional limit for one invocation
    pub fn new(program: impl Into<String>, timeout_secs: Option<u64>) -> Self {
        Self {
            program: program.into(),
            timeout_secs,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Execute the program with `args` and return its stdout
    ///
    /// # Errors
    /// Returns `HandlerError` if:
    /// - The executable cannot be spawned
    /// - It exits with a non-zero status
    /// - The invocation times out
    pub async fn execute(&self, args: &[String]) -> Result<String, HandlerError> {
        debug!("Running {} {}", self.program, args.join(" "));

        let child = Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output();

        let result = match self.timeout_secs {
            Some(secs) => timeout(Duration::from_secs(secs), child)
                .await
                .map_err(|_| HandlerError::Timeout(secs))?,
            None => child.await,
        };

        let output = result.map_err(|source| HandlerError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let code = output.status.code().unwrap_or(-1);
            warn!("{} exited with code {}: {}", self.program, code, stderr);
            return Err(HandlerError::Exit {
                program: self.program.clone(),
                code,
                stderr,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("{} returned {} bytes of output", self.program, stdout.len());

        Ok(stdout)
    }
}

/// Scalar stage options as template variables
fn option_variables(options: &StageOptions) -> HashMap<String, String> {
    options
        .extra
        .iter()
        .filter_map(|(key, value)| scalar_to_string(value).map(|v| (key.clone(), v)))
        .collect()
}

/// The `timeout_secs` option, which must be a whole number of seconds
fn timeout_option(stage_name: &str, options: &StageOptions) -> Result<Option<u64>, PipelineError> {
    options
        .get_string("timeout_secs")
        .map(|value| {
            value.parse::<u64>().map_err(|_| {
                PipelineError::config(format!(
                    "stage '{}': timeout_secs must be a whole number of seconds, got '{}'",
                    stage_name, value
                ))
            })
        })
        .transpose()
}

/// Stage handler that runs the stage's configured program once per file
#[derive(Debug, Clone)]
pub struct CommandHandler {
    stage_name: String,
    runner: CommandRunner,
    args_template: Option<Vec<String>>,
    options: HashMap<String, String>,
}

impl CommandHandler {
    /// Build a handler from a stage's options block
    pub fn from_options(stage_name: &str, options: &StageOptions) -> Result<Self, PipelineError> {
        Ok(Self {
            stage_name: stage_name.to_string(),
            runner: CommandRunner::new(
                options.program_or(stage_name),
                timeout_option(stage_name, options)?,
            ),
            args_template: options.args.clone(),
            options: option_variables(options),
        })
    }

    pub fn program(&self) -> &str {
        self.runner.program()
    }

    /// Variables available to the argument template of one item
    fn variables(&self, item: &WorkItem, args: &StageArgs) -> HashMap<String, String> {
        let mut vars = args
            .context()
            .map(|ctx| ctx.get_rendering_variables())
            .unwrap_or_default();
        vars.extend(self.options.clone());

        vars.insert("stage".to_string(), self.stage_name.clone());
        vars.insert("program".to_string(), self.runner.program().to_string());
        vars.insert("input".to_string(), item.input.display().to_string());
        vars.insert("out_dir".to_string(), item.out_dir.display().to_string());
        if let Some(ref output) = item.output {
            vars.insert("output".to_string(), output.display().to_string());
        }

        match args {
            StageArgs::Trim {
                pair,
                platform,
                min_length,
            } => {
                vars.insert("pair".to_string(), pair.as_str().to_string());
                vars.insert("platform".to_string(), platform.clone());
                vars.insert("min_length".to_string(), min_length.to_string());
            }
            StageArgs::Count { stage_name, .. } => {
                vars.insert("stage".to_string(), stage_name.clone());
            }
            _ => {}
        }

        vars
    }

    /// Render the command line arguments for one item
    pub fn render_args(&self, item: &WorkItem, args: &StageArgs) -> Vec<String> {
        let vars = self.variables(item, args);
        match self.args_template {
            Some(ref template) => template
                .iter()
                .map(|arg| render_template(arg, &vars))
                .collect(),
            None => {
                let mut default = vec![item.input.display().to_string()];
                if let Some(ref output) = item.output {
                    default.push(output.display().to_string());
                }
                default
            }
        }
    }
}

#[async_trait]
impl StageHandler for CommandHandler {
    async fn run(&self, item: &WorkItem, args: &StageArgs) -> Result<StageOutput, HandlerError> {
        let argv = self.render_args(item, args);
        let stdout = self.runner.execute(&argv).await?;

        if !args.kind().chains() {
            return Ok(StageOutput::Report(stdout));
        }

        let output = item.output.clone().ok_or_else(|| {
            HandlerError::UnexpectedOutput(format!(
                "no output path for {}",
                item.input.display()
            ))
        })?;
        let exists = tokio::fs::try_exists(&output).await.unwrap_or(false);
        if !exists {
            return Err(HandlerError::MissingOutput(output));
        }
        Ok(StageOutput::File(output))
    }
}

/// Final analysis run as an external program (e.g. an R script fitting DESeq)
#[derive(Debug, Clone)]
pub struct CommandAnalysis {
    runner: CommandRunner,
    args_template: Option<Vec<String>>,
    variables: HashMap<String, String>,
}

impl CommandAnalysis {
    /// Build the analysis command from the `combine.analysis` options block
    ///
    /// Without an options block the program defaults to the block's name.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let name = config.combine.analysis_stage();
        let default = StageOptions::default();
        let options = config.stage.get(name).unwrap_or(&default);

        let mut variables: HashMap<String, String> = config.reference_vars().into_iter().collect();
        variables.extend(option_variables(options));

        Ok(Self {
            runner: CommandRunner::new(options.program_or(name), timeout_option(name, options)?),
            args_template: options.args.clone(),
            variables,
        })
    }

    pub fn program(&self) -> &str {
        self.runner.program()
    }

    /// Render the command line arguments for a request
    pub fn render_args(&self, request: &AnalysisRequest) -> Vec<String> {
        let counts = request.combined.display().to_string();
        let conditions = request.labels.join(",");
        let output = request.output.display().to_string();

        match self.args_template {
            Some(ref template) => {
                let mut vars = self.variables.clone();
                vars.insert("counts".to_string(), counts);
                vars.insert("conditions".to_string(), conditions);
                vars.insert("output".to_string(), output);
                template.iter().map(|arg| render_template(arg, &vars)).collect()
            }
            None => vec![counts, conditions, output],
        }
    }
}

#[async_trait]
impl AnalysisHandler for CommandAnalysis {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<(), HandlerError> {
        let argv = self.render_args(request);
        self.runner.execute(&argv).await?;
        Ok(())
    }
}
