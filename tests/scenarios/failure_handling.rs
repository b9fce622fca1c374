//! Test: configuration errors, stage failures, and empty conditions

use crate::helpers::*;
use seqflow::core::{
    AggregationError, DriverPhase, ExecutionStatus, PipelineConfig, PipelineError, StageKind,
};
use seqflow::execution::{ExecutionEvent, StageRegistry};
use seqflow::handler::NoAnalysis;
use std::sync::Arc;

/// A stage listed in `run` without options is rejected at load time
#[test]
fn test_unknown_stage_rejected_at_load() {
    let yaml = r#"
dir: {data: data, results: results}
input_dirs: [WT]
ref: {}
stage: {trim: {}}
run: [trim, bowtie]
"#;
    let err = PipelineConfig::from_yaml(yaml).unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
    assert!(err.to_string().contains("bowtie"));
}

#[test]
fn test_missing_ref_rejected_at_load() {
    let yaml = r#"
dir: {data: data, results: results}
input_dirs: [WT]
stage: {trim: {}}
run: [trim]
"#;
    assert!(matches!(
        PipelineConfig::from_yaml(yaml).unwrap_err(),
        PipelineError::Config(_)
    ));
}

/// A stage without a handler fails before any item is dispatched
#[tokio::test]
async fn test_unregistered_stage_fails_before_dispatch() {
    let ws = Workspace::new();
    ws.seed_wt_ko();
    let log = CallLog::default();

    let config = ws.config(
        r#"
input_dirs: [WT, KO]
ref: {}
stage: {trim: {}, align: {}}
run: [trim, align]
"#,
    );
    let mut registry = StageRegistry::new();
    registry.register("trim", StageKind::Trim, CopyHandler::new("trim", &log));

    let run = run_pipeline(config, registry, Arc::new(NoAnalysis)).await;

    let err = run.result.unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
    assert!(err.to_string().contains("align"));
    assert_eq!(log.len(), 0);
    assert!(!ws.results().join("WT").exists());
}

/// One bad file fails the whole stage and stops the run at that condition
#[tokio::test]
async fn test_item_failure_aborts_run_with_location() {
    let ws = Workspace::new();
    ws.seed_wt_ko();
    let log = CallLog::default();

    let config = ws.config(
        r#"
input_dirs: [WT, KO]
ref: {}
stage: {trim: {}, count: {}}
run: [trim, count]
"#,
    );
    let mut registry = StageRegistry::new();
    registry
        .register(
            "trim",
            StageKind::Trim,
            FailingHandler {
                file_name: "d.fastq".to_string(),
            },
        )
        .register("count", StageKind::Count, CountHandler { log: log.clone() });

    let run = run_pipeline(config, registry, Arc::new(NoAnalysis)).await;

    match run.result.unwrap_err() {
        PipelineError::StageExecution {
            condition,
            stage,
            input,
            source,
        } => {
            assert_eq!(condition, "KO");
            assert_eq!(stage, "trim");
            assert_eq!(input, Some(ws.data().join("KO/d.fastq")));
            assert!(source.to_string().contains("truncated quality line"));
        }
        other => panic!("Expected stage failure, got {:?}", other),
    }

    // WT finished both stages before KO failed; KO never reached count
    assert_eq!(log.for_stage("count").len(), 2);
    assert!(!ws.results().join("deseq").exists());

    assert_eq!(run.pipeline.state.status, ExecutionStatus::Failed);
    assert_eq!(run.pipeline.state.completed_conditions, 1);
    match &run.pipeline.state.phase {
        DriverPhase::Failed { condition, stage, .. } => {
            assert_eq!(condition.as_deref(), Some("KO"));
            assert_eq!(stage.as_deref(), Some("trim"));
        }
        other => panic!("Expected Failed phase, got {:?}", other),
    }
    assert!(run
        .events
        .iter()
        .any(|e| matches!(e, ExecutionEvent::StageFailed { stage, .. } if stage == "trim")));
}

/// A condition with no inputs runs its stages as no-ops, then fails the combine
#[tokio::test]
async fn test_empty_condition_fails_at_combine() {
    let ws = Workspace::new();
    ws.seed("WT", &[("a.fastq", "@r1\nACGT\n")]);
    std::fs::create_dir_all(ws.data().join("KO")).unwrap();
    let log = CallLog::default();

    let config = ws.config(
        r#"
input_dirs: [WT, KO]
ref: {}
stage: {trim: {}, htseq-count: {}}
run: [trim, htseq-count]
"#,
    );
    let mut registry = StageRegistry::new();
    registry
        .register("trim", StageKind::Trim, CopyHandler::new("trim", &log))
        .register("htseq-count", StageKind::Count, CountHandler { log: log.clone() });

    let analysis = RecordingAnalysis::default();
    let run = run_pipeline(config, registry, Arc::new(analysis.clone())).await;

    let err = run.result.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::AggregationInvariant(AggregationError::EmptyCondition(ref c)) if c == "KO"
    ));
    assert!(analysis.requests.lock().unwrap().is_empty());
    assert!(run.events.iter().any(|e| matches!(
        e,
        ExecutionEvent::ConditionEmpty { condition, .. } if condition == "KO"
    )));
    // The empty condition still got its results directory
    assert!(ws.results().join("KO").is_dir());
    assert_eq!(run.pipeline.state.completed_conditions, 2);
}

/// A missing condition directory behaves like an empty one
#[tokio::test]
async fn test_missing_condition_dir_is_empty() {
    let ws = Workspace::new();
    ws.seed("WT", &[("a.fastq", "A")]);
    let log = CallLog::default();

    let config = ws.config(
        r#"
input_dirs: [WT, MUT]
ref: {}
stage: {trim: {}}
run: [trim]
"#,
    );
    let mut registry = StageRegistry::new();
    registry.register("trim", StageKind::Trim, CopyHandler::new("trim", &log));

    let run = run_pipeline(config, registry, Arc::new(NoAnalysis)).await;
    let summary = run.result.unwrap();

    // No countable stage, so the empty condition is only a warning
    assert!(summary.combine.is_none());
    assert!(summary.conditions[1].terminal.is_empty());
    assert_eq!(log.len(), 1);
}

/// A failing analysis is reported with the analysis stage name
#[tokio::test]
async fn test_analysis_failure_is_reported() {
    use async_trait::async_trait;
    use seqflow::handler::{AnalysisHandler, AnalysisRequest, HandlerError};

    struct Diverges;

    #[async_trait]
    impl AnalysisHandler for Diverges {
        async fn analyze(&self, _request: &AnalysisRequest) -> Result<(), HandlerError> {
            Err(HandlerError::Failed("dispersion fit failed".to_string()))
        }
    }

    let ws = Workspace::new();
    ws.seed("WT", &[("a.fastq", "A")]);
    ws.seed("KO", &[("b.fastq", "B")]);
    let log = CallLog::default();

    let config = ws.config(
        r#"
input_dirs: [WT, KO]
ref: {}
stage: {count: {}, edger: {program: Rscript}}
run: [count]
combine: {analysis: edger, out_dir: edger}
"#,
    );
    let mut registry = StageRegistry::new();
    registry.register("count", StageKind::Count, CountHandler { log });

    let run = run_pipeline(config, registry, Arc::new(Diverges)).await;
    let err = run.result.unwrap_err();

    assert!(matches!(err, PipelineError::Analysis { ref stage, .. } if stage == "edger"));
    // Combined inputs were written before the analysis ran
    assert!(ws.results().join("edger/all.combined.counts").exists());
    match &run.pipeline.state.phase {
        DriverPhase::Failed { condition, stage, .. } => {
            assert!(condition.is_none());
            assert_eq!(stage.as_deref(), Some("edger"));
        }
        other => panic!("Expected Failed phase, got {:?}", other),
    }
}
