//! Cross-condition aggregation - combine count files and run the final analysis

use crate::core::{fileset::ensure_dir, AggregationError, FileSet, PipelineError};
use crate::handler::{AnalysisHandler, AnalysisRequest};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Combined count table file name
pub const COMBINED_COUNTS: &str = "all.combined.counts";
/// Condition labels file name, one label per combined column
pub const COMBINED_CONDITIONS: &str = "all.combined.conditions";
/// Final analysis output file name
pub const ANALYSIS_OUTPUT: &str = "deseq.txt";

/// Flattened files of every condition with a parallel label per file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationRecord {
    labels: Vec<String>,
    files: Vec<PathBuf>,
}

impl AggregationRecord {
    /// Build a record from parallel label and file lists
    pub fn new(labels: Vec<String>, files: Vec<PathBuf>) -> Result<Self, PipelineError> {
        if labels.len() != files.len() {
            return Err(PipelineError::AggregationInvariant(
                AggregationError::LengthMismatch {
                    labels: labels.len(),
                    files: files.len(),
                },
            ));
        }
        Ok(Self { labels, files })
    }

    /// Flatten per-condition file sets, in condition order
    ///
    /// Every condition must contribute at least one file.
    pub fn flatten(per_condition: &[(String, FileSet)]) -> Result<Self, PipelineError> {
        if per_condition.is_empty() {
            return Err(PipelineError::EmptyInput {
                what: "aggregation (no conditions)".to_string(),
            });
        }

        let mut labels = Vec::new();
        let mut files = Vec::new();
        for (condition, set) in per_condition {
            if set.is_empty() {
                return Err(PipelineError::AggregationInvariant(
                    AggregationError::EmptyCondition(condition.clone()),
                ));
            }
            for file in set {
                labels.push(condition.clone());
                files.push(file.clone());
            }
        }
        Self::new(labels, files)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Column header of one sample: `<condition>_<file stem>`
fn column_name(label: &str, path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    format!("{}_{}", label, stem)
}

fn invalid(path: &Path, line: usize, msg: impl std::fmt::Display) -> PipelineError {
    PipelineError::io(
        path,
        io::Error::new(io::ErrorKind::InvalidData, format!("line {}: {}", line, msg)),
    )
}

/// Merge per-sample count files into one feature-by-sample table
///
/// Each input line is `feature<TAB>count`. Blank lines and `__`-prefixed
/// summary lines are skipped. Rows keep first-seen feature order and features
/// missing from a file count as 0. Columns follow the record's file order.
pub async fn combine_counts(
    record: &AggregationRecord,
    out: &Path,
) -> Result<PathBuf, PipelineError> {
    let files = record.files();
    let mut headers = HashSet::new();
    let columns: Vec<String> = record
        .labels()
        .iter()
        .zip(files)
        .map(|(label, path)| column_name(label, path))
        .collect();
    for column in &columns {
        if !headers.insert(column.as_str()) {
            return Err(PipelineError::AggregationInvariant(
                AggregationError::DuplicateColumn(column.clone()),
            ));
        }
    }

    let mut features: Vec<String> = Vec::new();
    let mut rows: HashMap<String, usize> = HashMap::new();
    let mut table: Vec<Vec<u64>> = Vec::new();

    for (column, path) in files.iter().enumerate() {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PipelineError::io(path, e))?;

        for (n, line) in content.lines().enumerate() {
            let line = line.trim_end();
            if line.is_empty() || line.starts_with("__") {
                continue;
            }
            let (feature, count) = line
                .split_once('\t')
                .ok_or_else(|| invalid(path, n + 1, "expected feature<TAB>count"))?;
            let count: u64 = count
                .trim()
                .parse()
                .map_err(|_| invalid(path, n + 1, format!("bad count '{}'", count.trim())))?;

            let row = match rows.get(feature) {
                Some(&row) => row,
                None => {
                    features.push(feature.to_string());
                    table.push(vec![0; files.len()]);
                    rows.insert(feature.to_string(), table.len() - 1);
                    table.len() - 1
                }
            };
            table[row][column] += count;
        }
    }

    let mut rendered = String::from("feature");
    for column in &columns {
        rendered.push('\t');
        rendered.push_str(column);
    }
    rendered.push('\n');
    for (feature, counts) in features.iter().zip(&table) {
        rendered.push_str(feature);
        for count in counts {
            rendered.push('\t');
            rendered.push_str(&count.to_string());
        }
        rendered.push('\n');
    }

    tokio::fs::write(out, rendered)
        .await
        .map_err(|e| PipelineError::io(out, e))?;
    debug!("Wrote {} features x {} samples to {}", features.len(), files.len(), out.display());
    Ok(out.to_path_buf())
}

/// Files written by one aggregation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombineOutput {
    pub combined: PathBuf,
    pub labels_file: PathBuf,
    pub analysis_output: PathBuf,
    pub labels: Vec<String>,
}

/// Combines the countable outputs of every condition and runs the analysis
#[derive(Clone)]
pub struct Aggregator {
    out_dir: PathBuf,
    analysis_stage: String,
    analysis: Arc<dyn AnalysisHandler>,
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("out_dir", &self.out_dir)
            .field("analysis_stage", &self.analysis_stage)
            .finish_non_exhaustive()
    }
}

impl Aggregator {
    pub fn new(
        out_dir: impl Into<PathBuf>,
        analysis_stage: impl Into<String>,
        analysis: Arc<dyn AnalysisHandler>,
    ) -> Self {
        Self {
            out_dir: out_dir.into(),
            analysis_stage: analysis_stage.into(),
            analysis,
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Write the combined table and labels, then run the analysis on them
    ///
    /// Re-running over the same inputs overwrites the outputs with identical content.
    pub async fn combine(
        &self,
        per_condition: &[(String, FileSet)],
    ) -> Result<CombineOutput, PipelineError> {
        let record = AggregationRecord::flatten(per_condition)?;
        info!(
            "Combining {} files from {} conditions",
            record.len(),
            per_condition.len()
        );

        ensure_dir(&self.out_dir).await?;

        let combined = combine_counts(&record, &self.out_dir.join(COMBINED_COUNTS)).await?;

        let labels_file = self.out_dir.join(COMBINED_CONDITIONS);
        let mut labels = record.labels().join("\n");
        labels.push('\n');
        tokio::fs::write(&labels_file, labels)
            .await
            .map_err(|e| PipelineError::io(&labels_file, e))?;

        let request = AnalysisRequest {
            combined: combined.clone(),
            labels: record.labels().to_vec(),
            output: self.out_dir.join(ANALYSIS_OUTPUT),
        };
        info!("Running analysis '{}'", self.analysis_stage);
        self.analysis
            .analyze(&request)
            .await
            .map_err(|source| PipelineError::Analysis {
                stage: self.analysis_stage.clone(),
                source,
            })?;

        Ok(CombineOutput {
            combined,
            labels_file,
            analysis_output: request.output,
            labels: request.labels,
        })
    }
}
