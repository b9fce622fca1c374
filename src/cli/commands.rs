//! CLI command definitions

use clap::Args;

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Worker slots (overrides cluster.cores)
    #[arg(long, value_parser = parse_cores)]
    pub cores: Option<usize>,

    /// Deadline in seconds for each stage's map call (overrides cluster.timeout_secs)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Don't save execution to history
    #[arg(long)]
    pub no_history: bool,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List pipelines in history
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Show execution counts
    #[arg(long)]
    pub with_counts: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show execution history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Pipeline name to filter by
    #[arg(short, long)]
    pub pipeline: Option<String>,

    /// Number of recent executions to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Show full details
    #[arg(long)]
    pub verbose: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a specific execution ID
    #[arg(long)]
    pub execution_id: Option<String>,
}

/// Parse a worker slot count (at least 1)
pub fn parse_cores(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("cores must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("Invalid core count: {}", s)),
    }
}
