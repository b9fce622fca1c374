//! Ordered file sets and derived output naming

use crate::core::error::PipelineError;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// An ordered sequence of files flowing between stages
///
/// Order is significant: stage outputs are correlated with their inputs by position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    files: Vec<PathBuf>,
}

impl FileSet {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self { files }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathBuf> {
        self.files.iter()
    }

    pub fn as_slice(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn into_vec(self) -> Vec<PathBuf> {
        self.files
    }

    /// List the regular files of a directory, sorted by file name
    ///
    /// Symlinks to files are listed; dangling links are skipped with a warning.
    /// A missing directory yields an empty set.
    pub async fn from_dir(dir: &Path, filter: Option<&Regex>) -> Result<Self, PipelineError> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Input directory {} does not exist", dir.display());
                return Ok(Self::empty());
            }
            Err(e) => return Err(PipelineError::io(dir, e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PipelineError::io(dir, e))?
        {
            let path = entry.path();
            let metadata = match tokio::fs::metadata(&path).await {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!("Skipping dangling link {}", path.display());
                    continue;
                }
                Err(e) => return Err(PipelineError::io(&path, e)),
            };
            if !metadata.is_file() {
                continue;
            }
            let name = entry.file_name();
            let keep = match (filter, name.to_str()) {
                (Some(re), Some(name)) => re.is_match(name),
                (Some(_), None) => false,
                (None, _) => true,
            };
            if keep {
                files.push(path);
            }
        }

        files.sort();
        Ok(Self { files })
    }
}

impl From<Vec<PathBuf>> for FileSet {
    fn from(files: Vec<PathBuf>) -> Self {
        Self::new(files)
    }
}

impl IntoIterator for FileSet {
    type Item = PathBuf;
    type IntoIter = std::vec::IntoIter<PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

impl<'a> IntoIterator for &'a FileSet {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

/// Insert `_<suffix>` before the extension of a file name
///
/// `extension` replaces the original extension when given.
pub fn append_stem(file_name: &Path, suffix: &str, extension: Option<&str>) -> PathBuf {
    let stem = file_name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = match extension {
        Some(ext) => Some(ext.to_string()),
        None => file_name
            .extension()
            .map(|e| e.to_string_lossy().into_owned()),
    };

    match ext {
        Some(ext) => PathBuf::from(format!("{}_{}.{}", stem, suffix, ext)),
        None => PathBuf::from(format!("{}_{}", stem, suffix)),
    }
}

/// Output path for `input` inside `out_dir`, named after the input's basename
pub fn derived_output(input: &Path, out_dir: &Path, suffix: &str, extension: Option<&str>) -> PathBuf {
    let base = input.file_name().map(Path::new).unwrap_or(input);
    out_dir.join(append_stem(base, suffix, extension))
}

/// Create `path` and its parents if absent
pub async fn ensure_dir(path: &Path) -> Result<(), PipelineError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| PipelineError::io(path, e))
}
