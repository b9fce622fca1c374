//! Test: two conditions through QC, trim, count, then combine and analyze

use crate::helpers::*;
use seqflow::core::{DriverPhase, ExecutionStatus, StageKind};
use seqflow::execution::{ExecutionEvent, StageRegistry};
use std::sync::Arc;

const RNASEQ: &str = r#"
name: rnaseq
input_dirs: [WT, KO]
ref: {genome: /refs/mm10, gtf: /refs/mm10.gtf}
stage:
  fastqc: {}
  trim: {pair: se, min_length: 20}
  htseq-count: {}
run: [fastqc, trim, htseq-count]
"#;

fn registry(log: &CallLog) -> StageRegistry {
    let mut registry = StageRegistry::new();
    registry
        .register("fastqc", StageKind::QualityReport, ReportHandler { log: log.clone() })
        .register("trim", StageKind::Trim, CopyHandler::new("trim", log))
        .register("htseq-count", StageKind::Count, CountHandler { log: log.clone() });
    registry
}

#[tokio::test]
async fn test_wt_ko_run_combines_counts_and_labels() {
    let ws = Workspace::new();
    ws.seed_wt_ko();
    let log = CallLog::default();
    let analysis = RecordingAnalysis::default();

    let run = run_pipeline(ws.config(RNASEQ), registry(&log), Arc::new(analysis.clone())).await;
    let summary = run.result.unwrap();

    // Every stage ran once per file, per condition
    assert_eq!(log.for_stage("fastqc").len(), 4);
    assert_eq!(log.for_stage("trim").len(), 4);
    assert_eq!(log.for_stage("count").len(), 4);

    let stage_calls: Vec<(String, String, usize)> = run
        .events
        .iter()
        .filter_map(|e| match e {
            ExecutionEvent::StageStarted {
                condition,
                stage,
                items,
            } => Some((condition.clone(), stage.clone(), *items)),
            _ => None,
        })
        .collect();
    assert_eq!(
        stage_calls,
        vec![
            ("WT".to_string(), "fastqc".to_string(), 2),
            ("WT".to_string(), "trim".to_string(), 2),
            ("WT".to_string(), "htseq-count".to_string(), 2),
            ("KO".to_string(), "fastqc".to_string(), 2),
            ("KO".to_string(), "trim".to_string(), 2),
            ("KO".to_string(), "htseq-count".to_string(), 2),
        ]
    );

    // Labels follow condition order then file order
    assert_eq!(ws.read("deseq/all.combined.conditions"), "WT\nWT\nKO\nKO\n");

    let combined = ws.read("deseq/all.combined.counts");
    let mut lines = combined.lines();
    assert_eq!(
        lines.next(),
        Some("feature\tWT_a_trim_count\tWT_b_trim_count\tKO_c_trim_count\tKO_d_trim_count")
    );
    // geneA counts are the input sizes: 9, 13, 7, 11 bytes
    assert_eq!(lines.next(), Some("geneA\t9\t13\t7\t11"));
    assert_eq!(lines.next(), Some("geneB\t1\t1\t1\t1"));
    assert_eq!(lines.next(), None);

    let requests = analysis.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].labels, vec!["WT", "WT", "KO", "KO"]);
    assert_eq!(requests[0].combined, ws.results().join("deseq/all.combined.counts"));
    assert!(ws.results().join("deseq/deseq.txt").exists());

    let combine = summary.combine.expect("countable stage present");
    assert_eq!(combine.labels.len(), 4);

    assert_eq!(run.pipeline.state.status, ExecutionStatus::Completed);
    assert_eq!(run.pipeline.state.phase, DriverPhase::Done);
    assert_eq!(run.pipeline.state.completed_conditions, 2);
    assert_eq!(run.pipeline.state.stages_run, 6);
}

/// Each condition writes under its own results directory
#[tokio::test]
async fn test_conditions_do_not_share_outputs() {
    let ws = Workspace::new();
    ws.seed_wt_ko();
    let log = CallLog::default();

    run_pipeline(ws.config(RNASEQ), registry(&log), Arc::new(RecordingAnalysis::default()))
        .await
        .result
        .unwrap();

    for call in log.for_stage("count") {
        let output = call.output.expect("count output");
        let condition_dir = if call.input.to_string_lossy().contains("/WT/") {
            "WT"
        } else {
            "KO"
        };
        assert!(output.starts_with(ws.results().join(condition_dir).join("counts")));
    }
    assert!(ws.results().join("WT/counts/a_trim_count.counts").exists());
    assert!(ws.results().join("KO/counts/d_trim_count.counts").exists());
}

/// Deleting only the combined artifacts and re-running recreates them byte-identical
#[tokio::test]
async fn test_rerun_is_idempotent() {
    let ws = Workspace::new();
    ws.seed_wt_ko();

    let first = run_pipeline(
        ws.config(RNASEQ),
        registry(&CallLog::default()),
        Arc::new(RecordingAnalysis::default()),
    )
    .await;
    first.result.unwrap();
    let labels = std::fs::read(ws.results().join("deseq/all.combined.conditions")).unwrap();
    let counts = std::fs::read(ws.results().join("deseq/all.combined.counts")).unwrap();

    std::fs::remove_file(ws.results().join("deseq/all.combined.conditions")).unwrap();
    std::fs::remove_file(ws.results().join("deseq/all.combined.counts")).unwrap();

    let second = run_pipeline(
        ws.config(RNASEQ),
        registry(&CallLog::default()),
        Arc::new(RecordingAnalysis::default()),
    )
    .await;
    second.result.unwrap();

    assert_eq!(
        std::fs::read(ws.results().join("deseq/all.combined.conditions")).unwrap(),
        labels
    );
    assert_eq!(
        std::fs::read(ws.results().join("deseq/all.combined.counts")).unwrap(),
        counts
    );
    assert_ne!(
        first.pipeline.state.execution_id,
        second.pipeline.state.execution_id
    );
}
