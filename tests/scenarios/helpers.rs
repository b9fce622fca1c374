//! Test utilities: temp workspaces, mock stage handlers, and a run helper
#![allow(dead_code)]

use async_trait::async_trait;
use seqflow::core::config::ClusterConfig;
use seqflow::core::{Pipeline, PipelineConfig, PipelineError, StageArgs, StageOutput, WorkItem};
use seqflow::execution::{start_cluster, ExecutionEngine, ExecutionEvent, RunSummary, StageRegistry};
use seqflow::handler::{AnalysisHandler, AnalysisRequest, HandlerError, StageHandler};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// A throwaway `data/` + `results/` tree
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn data(&self) -> PathBuf {
        self.root().join("data")
    }

    pub fn results(&self) -> PathBuf {
        self.root().join("results")
    }

    /// Create `data/<condition>` with the given files
    pub fn seed(&self, condition: &str, files: &[(&str, &str)]) {
        let dir = self.data().join(condition);
        std::fs::create_dir_all(&dir).expect("create condition dir");
        for (name, content) in files {
            std::fs::write(dir.join(name), content).expect("write input file");
        }
    }

    /// Standard two-condition layout with two read files each
    pub fn seed_wt_ko(&self) {
        self.seed("WT", &[("a.fastq", "@r1\nACGT\n"), ("b.fastq", "@r2\nACGTACGT\n")]);
        self.seed("KO", &[("c.fastq", "@r3\nAC\n"), ("d.fastq", "@r4\nACGTAC\n")]);
    }

    /// Build a config whose `dir` points into this workspace
    pub fn config(&self, body: &str) -> PipelineConfig {
        let yaml = format!(
            "dir:\n  data: {}\n  results: {}\n{}",
            self.data().display(),
            self.results().display(),
            body
        );
        PipelineConfig::from_yaml(&yaml).expect("valid test config")
    }

    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.results().join(relative))
            .unwrap_or_else(|e| panic!("read {}: {}", relative, e))
    }
}

/// Record of one handler invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub stage: String,
    pub input: PathBuf,
    pub output: Option<PathBuf>,
}

/// Shared log of calls across handlers
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    pub fn record(&self, stage: &str, item: &WorkItem) {
        self.calls.lock().unwrap().push(Call {
            stage: stage.to_string(),
            input: item.input.clone(),
            output: item.output.clone(),
        });
    }

    pub fn for_stage(&self, stage: &str) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.stage == stage)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

/// Copies each input to its output path
pub struct CopyHandler {
    pub stage: String,
    pub log: CallLog,
    /// Sleep longer for earlier items, so they finish last
    pub reverse_delay: Option<Duration>,
}

impl CopyHandler {
    pub fn new(stage: &str, log: &CallLog) -> Self {
        Self {
            stage: stage.to_string(),
            log: log.clone(),
            reverse_delay: None,
        }
    }

    pub fn with_reverse_delay(mut self, step: Duration) -> Self {
        self.reverse_delay = Some(step);
        self
    }
}

#[async_trait]
impl StageHandler for CopyHandler {
    async fn run(&self, item: &WorkItem, _args: &StageArgs) -> Result<StageOutput, HandlerError> {
        self.log.record(&self.stage, item);
        if let Some(step) = self.reverse_delay {
            tokio::time::sleep(step * (10u32.saturating_sub(item.index as u32))).await;
        }
        let output = item
            .output
            .clone()
            .ok_or_else(|| HandlerError::Failed("no output path".to_string()))?;
        tokio::fs::copy(&item.input, &output)
            .await
            .map_err(|e| HandlerError::Failed(e.to_string()))?;
        Ok(StageOutput::File(output))
    }
}

/// Writes a small count table derived from the input's size
pub struct CountHandler {
    pub log: CallLog,
}

#[async_trait]
impl StageHandler for CountHandler {
    async fn run(&self, item: &WorkItem, _args: &StageArgs) -> Result<StageOutput, HandlerError> {
        self.log.record("count", item);
        let output = item
            .output
            .clone()
            .ok_or_else(|| HandlerError::Failed("no output path".to_string()))?;
        let size = tokio::fs::metadata(&item.input)
            .await
            .map_err(|e| HandlerError::Failed(e.to_string()))?
            .len();
        let table = format!("geneA\t{}\ngeneB\t1\n__no_feature\t9\n", size);
        tokio::fs::write(&output, table)
            .await
            .map_err(|e| HandlerError::Failed(e.to_string()))?;
        Ok(StageOutput::File(output))
    }
}

/// Report-only handler (quality control)
pub struct ReportHandler {
    pub log: CallLog,
}

#[async_trait]
impl StageHandler for ReportHandler {
    async fn run(&self, item: &WorkItem, _args: &StageArgs) -> Result<StageOutput, HandlerError> {
        self.log.record("fastqc", item);
        Ok(StageOutput::Report(format!("{}: PASS", item.input.display())))
    }
}

/// Fails for inputs whose file name matches
pub struct FailingHandler {
    pub file_name: String,
}

#[async_trait]
impl StageHandler for FailingHandler {
    async fn run(&self, item: &WorkItem, _args: &StageArgs) -> Result<StageOutput, HandlerError> {
        if item.input.file_name().and_then(|n| n.to_str()) == Some(self.file_name.as_str()) {
            return Err(HandlerError::Exit {
                program: "sickle".to_string(),
                code: 1,
                stderr: "truncated quality line".to_string(),
            });
        }
        let output = item.output.clone().unwrap_or_else(|| item.input.clone());
        tokio::fs::copy(&item.input, &output)
            .await
            .map_err(|e| HandlerError::Failed(e.to_string()))?;
        Ok(StageOutput::File(output))
    }
}

/// Analysis handler that records its requests and writes a stub result
#[derive(Clone, Default)]
pub struct RecordingAnalysis {
    pub requests: Arc<Mutex<Vec<AnalysisRequest>>>,
}

#[async_trait]
impl AnalysisHandler for RecordingAnalysis {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<(), HandlerError> {
        self.requests.lock().unwrap().push(request.clone());
        tokio::fs::write(&request.output, "gene\tlog2FoldChange\n")
            .await
            .map_err(|e| HandlerError::Failed(e.to_string()))
    }
}

/// Outcome of a test run
pub struct TestRun {
    pub pipeline: Pipeline,
    pub result: Result<RunSummary, PipelineError>,
    pub events: Vec<ExecutionEvent>,
}

/// Run `config` with the given registry and analysis (two worker slots unless configured)
pub async fn run_pipeline(
    config: PipelineConfig,
    registry: StageRegistry,
    analysis: Arc<dyn AnalysisHandler>,
) -> TestRun {
    let cluster = start_cluster(&ClusterConfig {
        cores: config.cluster.cores.or(Some(2)),
        timeout_secs: config.cluster.timeout_secs,
    });
    let engine = ExecutionEngine::new(registry, cluster.clone(), analysis);

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    engine
        .add_event_handler(move |event| sink.lock().unwrap().push(event))
        .await;

    let mut pipeline = Pipeline::from_config(config);
    let result = engine.execute(&mut pipeline).await;
    cluster.stop();

    let events = events.lock().unwrap().clone();
    TestRun {
        pipeline,
        result,
        events,
    }
}

/// File names of a path list
pub fn names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
        .collect()
}
