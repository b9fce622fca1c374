//! Stage domain model

use crate::core::{
    config::StageOptions,
    context::ConditionContext,
    error::PipelineError,
};
use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;
use std::fmt;
use std::path::PathBuf;

/// The kinds of stage the registry knows how to build arguments for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    QualityReport,
    Trim,
    AdapterRemoval,
    Align,
    Count,
}

/// How a stage names and places its outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputNaming {
    /// Directory under the condition results directory
    pub dir: &'static str,
    /// Suffix inserted before the extension
    pub suffix: &'static str,
    /// Replacement extension, if any
    pub extension: Option<&'static str>,
}

impl StageKind {
    pub const ALL: [StageKind; 5] = [
        StageKind::QualityReport,
        StageKind::Trim,
        StageKind::AdapterRemoval,
        StageKind::Align,
        StageKind::Count,
    ];

    /// Canonical stage name
    pub fn name(&self) -> &'static str {
        match self {
            StageKind::QualityReport => "quality-report",
            StageKind::Trim => "trim",
            StageKind::AdapterRemoval => "adapter-removal",
            StageKind::Align => "align",
            StageKind::Count => "count",
        }
    }

    /// Tool name conventionally used for this kind in configs
    pub fn tool_alias(&self) -> &'static str {
        match self {
            StageKind::QualityReport => "fastqc",
            StageKind::Trim => "sickle",
            StageKind::AdapterRemoval => "cutadapt",
            StageKind::Align => "tophat",
            StageKind::Count => "htseq-count",
        }
    }

    /// Whether the stage's outputs replace the active file set
    pub fn chains(&self) -> bool {
        !matches!(self, StageKind::QualityReport)
    }

    /// Default output placement
    pub fn naming(&self) -> OutputNaming {
        match self {
            StageKind::QualityReport => OutputNaming {
                dir: "quality_report",
                suffix: "report",
                extension: None,
            },
            StageKind::Trim => OutputNaming {
                dir: "trimmed",
                suffix: "trim",
                extension: None,
            },
            StageKind::AdapterRemoval => OutputNaming {
                dir: "adapter_removed",
                suffix: "cutadapt",
                extension: None,
            },
            StageKind::Align => OutputNaming {
                dir: "aligned",
                suffix: "align",
                extension: Some("bam"),
            },
            StageKind::Count => OutputNaming {
                dir: "counts",
                suffix: "count",
                extension: Some("counts"),
            },
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Single- or paired-end reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairMode {
    Se,
    Pe,
}

impl PairMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "se" => Some(PairMode::Se),
            "pe" => Some(PairMode::Pe),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PairMode::Se => "se",
            PairMode::Pe => "pe",
        }
    }
}

/// Arguments shared by every work item of one stage call
///
/// Built once per stage and handed to each item behind an `Arc`.
#[derive(Debug, Clone)]
pub enum StageArgs {
    QualityReport {
        stage: StageOptions,
        context: ConditionContext,
    },
    Trim {
        pair: PairMode,
        platform: String,
        min_length: u32,
    },
    AdapterRemoval {
        stage: StageOptions,
        context: ConditionContext,
    },
    Align {
        /// Unused slot kept in the argument shape of aligners
        placeholder: Option<String>,
        reference: Mapping,
        program: String,
        context: ConditionContext,
    },
    Count {
        context: ConditionContext,
        stage_name: String,
    },
}

impl StageArgs {
    /// Build the shared arguments of `kind` for one stage call
    pub fn build(
        kind: StageKind,
        stage_name: &str,
        options: &StageOptions,
        context: &ConditionContext,
    ) -> Result<Self, PipelineError> {
        let args = match kind {
            StageKind::QualityReport => StageArgs::QualityReport {
                stage: options.clone(),
                context: context.clone(),
            },
            StageKind::Trim => {
                let pair_value = options.get_string("pair").unwrap_or_else(|| "se".to_string());
                let pair = PairMode::parse(&pair_value).ok_or_else(|| {
                    PipelineError::config(format!(
                        "stage '{}': pair must be 'se' or 'pe', got '{}'",
                        stage_name, pair_value
                    ))
                })?;
                let min_length = match options.get_string("min_length") {
                    Some(value) => value.parse::<u32>().map_err(|_| {
                        PipelineError::config(format!(
                            "stage '{}': min_length must be a non-negative integer, got '{}'",
                            stage_name, value
                        ))
                    })?,
                    None => 20,
                };
                StageArgs::Trim {
                    pair,
                    platform: options
                        .get_string("platform")
                        .unwrap_or_else(|| "sanger".to_string()),
                    min_length,
                }
            }
            StageKind::AdapterRemoval => StageArgs::AdapterRemoval {
                stage: options.clone(),
                context: context.clone(),
            },
            StageKind::Align => StageArgs::Align {
                placeholder: None,
                reference: context.config.reference.clone(),
                program: options.program_or(stage_name).to_string(),
                context: context.clone(),
            },
            StageKind::Count => StageArgs::Count {
                context: context.clone(),
                stage_name: stage_name.to_string(),
            },
        };
        Ok(args)
    }

    pub fn kind(&self) -> StageKind {
        match self {
            StageArgs::QualityReport { .. } => StageKind::QualityReport,
            StageArgs::Trim { .. } => StageKind::Trim,
            StageArgs::AdapterRemoval { .. } => StageKind::AdapterRemoval,
            StageArgs::Align { .. } => StageKind::Align,
            StageArgs::Count { .. } => StageKind::Count,
        }
    }

    /// Condition context, for kinds that carry one
    pub fn context(&self) -> Option<&ConditionContext> {
        match self {
            StageArgs::QualityReport { context, .. }
            | StageArgs::AdapterRemoval { context, .. }
            | StageArgs::Align { context, .. }
            | StageArgs::Count { context, .. } => Some(context),
            StageArgs::Trim { .. } => None,
        }
    }
}

/// One unit of per-file work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Position in the stage's input file set
    pub index: usize,
    /// Input file
    pub input: PathBuf,
    /// Stage output directory (exists before the item runs)
    pub out_dir: PathBuf,
    /// Output path (chaining stages only)
    pub output: Option<PathBuf>,
}

/// What a handler produced for one work item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutput {
    /// A file that becomes part of the next stage's input
    File(PathBuf),
    /// A report that is not chained (e.g. QC output)
    Report(String),
}

/// A resolved stage: name, kind, and options
#[derive(Debug, Clone)]
pub struct StageSpec {
    pub name: String,
    pub kind: StageKind,
    pub options: StageOptions,
}

impl StageSpec {
    /// Output directory name, honoring the `out_dir` option
    pub fn out_dir_name(&self) -> &str {
        self.options
            .out_dir
            .as_deref()
            .unwrap_or(self.kind.naming().dir)
    }
}
