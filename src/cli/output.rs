//! CLI output formatting

use crate::{core::ExecutionStatus, execution::ExecutionEvent, persistence::ExecutionSummary};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar over condition x stage runs
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// First eight characters of an execution id
pub fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Format execution summary for display
pub fn format_execution_summary(summary: &ExecutionSummary) -> String {
    let status_icon = match summary.status {
        ExecutionStatus::Completed => CHECK,
        ExecutionStatus::Failed => CROSS,
        ExecutionStatus::Running => SPINNER,
        ExecutionStatus::Pending => INFO,
    };

    let mut line = format!(
        "{} {} - {} - {} ({}/{} conditions, {} stage runs) - {}",
        status_icon,
        style(short_id(&summary.execution_id)).dim(),
        style(&summary.pipeline_name).bold(),
        format_status(summary.status),
        summary.completed_conditions,
        summary.total_conditions,
        summary.stages_run,
        style(format!("{:.0}%", summary.progress * 100.0)).cyan()
    );

    if let Some(location) = failure_location(summary) {
        line.push_str(&format!(" - at {}", style(location).red()));
    }
    line
}

/// `condition/stage` where a failed run stopped
pub fn failure_location(summary: &ExecutionSummary) -> Option<String> {
    match (&summary.failed_condition, &summary.failed_stage) {
        (Some(condition), Some(stage)) => Some(format!("{}/{}", condition, stage)),
        (Some(condition), None) => Some(condition.clone()),
        (None, Some(stage)) => Some(stage.clone()),
        (None, None) => None,
    }
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name,
            conditions,
            stages,
        } => format!(
            "{} Starting pipeline {} ({}): {} conditions x {} stages",
            ROCKET,
            style(pipeline_name).bold(),
            style(short_id(execution_id)).dim(),
            conditions,
            stages
        ),
        ExecutionEvent::ConditionStarted { condition, index } => {
            format!("{} Condition {} (#{})", INFO, style(condition).bold(), index + 1)
        }
        ExecutionEvent::ConditionEmpty {
            condition,
            input_dir,
        } => format!(
            "{} Condition {} has no input files in {}",
            WARN,
            style(condition).yellow(),
            style(input_dir.display()).dim()
        ),
        ExecutionEvent::StageStarted {
            condition,
            stage,
            items,
        } => format!(
            "{} {}/{} ({} files)",
            SPINNER,
            style(condition).dim(),
            style(stage).cyan(),
            items
        ),
        ExecutionEvent::StageCompleted {
            condition,
            stage,
            outputs,
        } => format!(
            "{} {}/{} → {} files",
            CHECK,
            style(condition).dim(),
            style(stage).green(),
            outputs
        ),
        ExecutionEvent::StageFailed {
            condition,
            stage,
            error,
        } => format!(
            "{} {}/{}: {}",
            CROSS,
            style(condition).dim(),
            style(stage).red(),
            style(error).dim()
        ),
        ExecutionEvent::ConditionCompleted { condition, files } => format!(
            "{} Condition {} done ({} files)",
            CHECK,
            style(condition).green(),
            files
        ),
        ExecutionEvent::AggregationStarted { stage, conditions } => format!(
            "{} Combining {} output across {} conditions",
            SPINNER,
            style(stage).cyan(),
            conditions
        ),
        ExecutionEvent::AggregationSkipped => {
            format!("{} No countable stage in run; nothing to combine", INFO)
        }
        ExecutionEvent::AggregationCompleted {
            combined,
            analysis_output,
        } => format!(
            "{} Combined counts in {}, analysis in {}",
            CHECK,
            style(combined.display()).dim(),
            style(analysis_output.display()).dim()
        ),
        ExecutionEvent::PipelineCompleted {
            execution_id,
            status,
        } => {
            let status_str = match status {
                ExecutionStatus::Completed => format!("{} completed", style("successfully").green()),
                ExecutionStatus::Failed => style("failed").red().to_string(),
                _ => format!("{:?}", status),
            };
            format!(
                "{} Pipeline ({}) {}",
                INFO,
                style(short_id(execution_id)).dim(),
                status_str
            )
        }
    }
}

/// Human-readable duration
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
