use anyhow::{Context, Result};
use seqflow::cli::commands::{HistoryCommand, ListCommand, RunCommand, ValidateCommand};
use seqflow::cli::output::*;
use seqflow::cli::{Cli, Command};
use seqflow::core::{ExecutionStatus, Pipeline, PipelineConfig};
use seqflow::execution::{start_cluster, ExecutionEngine, ExecutionEvent, StageRegistry};
use seqflow::handler::CommandAnalysis;
use seqflow::persistence::{
    create_summary, ExecutionSummary, PersistenceBackend, SqliteExecutionStore,
};
use std::sync::Arc;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::List(cmd) => list_pipelines(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

async fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    let mut config =
        PipelineConfig::from_file(&cmd.file).context("Failed to load pipeline config")?;

    if let Some(cores) = cmd.cores {
        config.cluster.cores = Some(cores);
    }
    if let Some(timeout) = cmd.timeout {
        config.cluster.timeout_secs = Some(timeout);
    }

    println!("{} Loaded pipeline: {}", INFO, style(&config.name).bold());

    let registry =
        StageRegistry::with_command_handlers(&config).context("Failed to build stage registry")?;
    let analysis = Arc::new(
        CommandAnalysis::from_config(&config).context("Failed to configure analysis")?,
    );
    let cluster = start_cluster(&config.cluster);

    let store = if cmd.no_history {
        None
    } else {
        Some(SqliteExecutionStore::with_default_path().await?)
    };

    let mut pipeline = Pipeline::from_config(config);
    let engine = ExecutionEngine::new(registry, cluster.clone(), analysis);

    let total = pipeline.conditions().len() * pipeline.stages().len();
    let progress = (!cmd.no_progress && total > 0).then(|| create_progress_bar(total));
    let bar = progress.clone();
    engine
        .add_event_handler(move |event| {
            let line = format_execution_event(&event);
            match &bar {
                Some(bar) => {
                    if let ExecutionEvent::StageCompleted { condition, stage, .. } = &event {
                        bar.inc(1);
                        bar.set_message(format!("{}/{}", condition, stage));
                    }
                    bar.println(line);
                }
                None => println!("{}", line),
            }
        })
        .await;

    println!();
    let result = engine.execute(&mut pipeline).await;
    cluster.stop();
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    if let Some(store) = store {
        let summary = create_summary(&pipeline);
        store.save_execution(&summary).await?;
        println!(
            "\n{} Execution saved to history (ID: {})",
            INFO,
            style(short_id(&summary.execution_id)).dim()
        );
    }

    match result {
        Ok(summary) => {
            println!(
                "\n{} {} completed {}",
                CHECK,
                style(&pipeline.name).bold(),
                style("successfully").green()
            );
            if let Some(combine) = summary.combine {
                println!("  Combined counts: {}", style(combine.combined.display()).dim());
                println!("  Conditions: {}", style(combine.labels_file.display()).dim());
                println!("  Analysis: {}", style(combine.analysis_output.display()).dim());
            }
            Ok(())
        }
        Err(e) => {
            println!(
                "\n{} {} {}",
                CROSS,
                style(&pipeline.name).bold(),
                style("failed").red()
            );
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    let result = PipelineConfig::from_file(&cmd.file).and_then(|config| {
        let registry = StageRegistry::with_command_handlers(&config)?;
        registry.validate(&config)?;
        CommandAnalysis::from_config(&config)?;
        Ok((config, registry))
    });

    match result {
        Ok((config, registry)) => {
            println!("{} Pipeline configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!("  Conditions: {}", style(config.input_dirs.join(", ")).cyan());
            println!("  Stages: {}", style(config.run.join(" → ")).cyan());
            match registry.countable_stage(&config) {
                Some(stage) => println!(
                    "  Combine: {} → {}",
                    style(stage).cyan(),
                    style(config.combine.analysis_stage()).cyan()
                ),
                None => println!("  Combine: {}", style("none").dim()),
            }

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(e).red());
            std::process::exit(1);
        }
    }
}

async fn list_pipelines(cmd: &ListCommand) -> Result<()> {
    let store = SqliteExecutionStore::with_default_path().await?;
    let pipelines = store.list_pipelines().await?;

    if pipelines.is_empty() {
        println!("{} No pipelines found in history", INFO);
        return Ok(());
    }

    println!("{} Pipelines in history:", INFO);

    let mut json_data = Vec::new();
    for pipeline_name in &pipelines {
        let executions = store.list_executions(pipeline_name).await?;

        if cmd.with_counts {
            let completed = executions
                .iter()
                .filter(|e| e.status == ExecutionStatus::Completed)
                .count();
            let failed = executions
                .iter()
                .filter(|e| e.status == ExecutionStatus::Failed)
                .count();
            println!(
                "  {} ({} runs: {} succeeded, {} failed)",
                style(pipeline_name).bold(),
                style(executions.len()).cyan(),
                style(completed).green(),
                style(failed).red()
            );
        } else {
            println!("  {}", style(pipeline_name).bold());
        }

        json_data.push(serde_json::json!({
            "name": pipeline_name,
            "execution_count": executions.len()
        }));
    }

    if cmd.json {
        let data = serde_json::json!({ "pipelines": json_data });
        println!("\n{}", serde_json::to_string_pretty(&data)?);
    }

    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = SqliteExecutionStore::with_default_path().await?;

    if let Some(exec_id_str) = &cmd.execution_id {
        let exec_id =
            uuid::Uuid::parse_str(exec_id_str).context("Invalid execution ID format")?;

        match store.load_execution(exec_id).await? {
            Some(summary) => print_execution_details(&summary, cmd.verbose)?,
            None => println!("{} Execution not found", WARN),
        }
        return Ok(());
    }

    let executions = if let Some(pipeline_name) = &cmd.pipeline {
        let mut execs = store.list_executions(pipeline_name).await?;
        execs.truncate(cmd.limit);
        execs
    } else {
        let mut all_execs = Vec::new();
        for pipeline in &store.list_pipelines().await? {
            all_execs.extend(store.list_executions(pipeline).await?);
        }
        all_execs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        all_execs.truncate(cmd.limit);
        all_execs
    };

    if executions.is_empty() {
        println!("{} No executions found", INFO);
        return Ok(());
    }

    if cmd.json {
        let data = serde_json::json!({ "executions": executions });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        println!("{} Execution history (showing latest {}):", INFO, cmd.limit);
        for summary in &executions {
            println!("  {}", format_execution_summary(summary));
        }
    }

    Ok(())
}

fn print_execution_details(summary: &ExecutionSummary, verbose: bool) -> Result<()> {
    println!("{} Execution Details", INFO);
    println!("  ID: {}", style(summary.execution_id).cyan());
    println!("  Pipeline: {}", style(&summary.pipeline_name).bold());
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!(
        "  Progress: {} ({}/{} conditions, {} stage runs)",
        style(format!("{:.0}%", summary.progress * 100.0)).cyan(),
        summary.completed_conditions,
        summary.total_conditions,
        summary.stages_run
    );
    if let Some(location) = failure_location(summary) {
        println!("  Failed at: {}", style(location).red());
    }
    if let Some(ref error) = summary.error {
        println!("  Error: {}", style(error).red());
    }

    if verbose {
        println!("\n  {}", style("Full details:").bold());
        let json = serde_json::to_string_pretty(summary)?;
        for line in json.lines() {
            println!("    {}", line);
        }
    }

    Ok(())
}
