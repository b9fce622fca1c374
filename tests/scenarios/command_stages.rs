//! Test: stages and analysis backed by real external commands

#![cfg(unix)]

use crate::helpers::*;
use seqflow::core::{PipelineError, StageKind};
use seqflow::execution::StageRegistry;
use seqflow::handler::CommandAnalysis;
use std::sync::Arc;

const COMMANDS: &str = r#"
name: command-stages
input_dirs: [WT, KO]
ref: {}
stage:
  fastqc: {program: "true"}
  trim: {program: cp, args: ["{{ input }}", "{{ output }}"]}
  htseq-count: {program: cp}
  deseq: {program: cp, args: ["{{ counts }}", "{{ output }}"]}
run: [fastqc, trim, htseq-count]
"#;

#[tokio::test]
async fn test_command_pipeline_end_to_end() {
    let ws = Workspace::new();
    ws.seed("WT", &[("w1.fastq", "g1\t3\ng2\t0\n"), ("w2.fastq", "g1\t5\n")]);
    ws.seed("KO", &[("k1.fastq", "g2\t8\n__ambiguous\t1\n")]);

    let config = ws.config(COMMANDS);
    let registry = StageRegistry::with_command_handlers(&config).unwrap();
    assert_eq!(registry.resolve("htseq-count").unwrap().kind, StageKind::Count);
    let analysis = Arc::new(CommandAnalysis::from_config(&config).unwrap());

    let run = run_pipeline(config, registry, analysis).await;
    run.result.unwrap();

    assert_eq!(ws.read("WT/trimmed/w2_trim.fastq"), "g1\t5\n");
    assert_eq!(
        ws.read("deseq/all.combined.counts"),
        "feature\tWT_w1_trim_count\tWT_w2_trim_count\tKO_k1_trim_count\ng1\t3\t5\t0\ng2\t0\t0\t8\n"
    );
    assert_eq!(ws.read("deseq/all.combined.conditions"), "WT\nWT\nKO\n");
    // The cp "analysis" copied the combined table to its output
    assert_eq!(
        ws.read("deseq/deseq.txt"),
        ws.read("deseq/all.combined.counts")
    );
}

#[tokio::test]
async fn test_failing_command_names_the_stage() {
    let ws = Workspace::new();
    ws.seed("WT", &[("a.fastq", "x")]);

    let config = ws.config(
        r#"
input_dirs: [WT]
ref: {}
stage:
  trim: {program: "false"}
run: [trim]
"#,
    );
    let registry = StageRegistry::with_command_handlers(&config).unwrap();
    let analysis = Arc::new(CommandAnalysis::from_config(&config).unwrap());

    let run = run_pipeline(config, registry, analysis).await;
    match run.result.unwrap_err() {
        PipelineError::StageExecution { stage, input, .. } => {
            assert_eq!(stage, "trim");
            assert_eq!(input, Some(ws.data().join("WT/a.fastq")));
        }
        other => panic!("Expected stage failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_stage_with_unknown_kind_rejected() {
    let ws = Workspace::new();
    let config = ws.config(
        r#"
input_dirs: [WT]
ref: {}
stage:
  dedupe: {program: "true"}
run: [dedupe]
"#,
    );
    let err = StageRegistry::with_command_handlers(&config).unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
}
