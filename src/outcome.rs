//! Result descriptors returned to callers.
//!
//! A submission always ends in exactly one [`ConversionOutcome`]. Failures
//! are values here, not `Err`s: the presentation layer renders all three
//! variants, and `Demo` in particular is a success path.

use crate::error::{ConvertError, ErrorKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::warn;

/// Terminal state of one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionOutcome {
    /// The conversion ran and produced an output file.
    Converted { output: OutputRef, size_bytes: u64 },

    /// Accepted but not performed: the office tool is not installed, so a
    /// placeholder artifact was written instead.
    Demo {
        message: String,
        placeholder: OutputRef,
    },

    /// The conversion was rejected or failed. No output file remains.
    Failed { kind: ErrorKind, message: String },
}

impl ConversionOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, ConversionOutcome::Failed { .. })
    }

    /// The artifact a caller can fetch, if any.
    pub fn artifact(&self) -> Option<&OutputRef> {
        match self {
            ConversionOutcome::Converted { output, .. } => Some(output),
            ConversionOutcome::Demo { placeholder, .. } => Some(placeholder),
            ConversionOutcome::Failed { .. } => None,
        }
    }

    /// Kind of failure, `None` for the success variants.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ConversionOutcome::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<ConvertError> for ConversionOutcome {
    fn from(e: ConvertError) -> Self {
        ConversionOutcome::Failed {
            kind: e.kind(),
            message: e.summary(),
        }
    }
}

/// Reference to a file in the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRef {
    /// Bare file name; the key accepted by `Converter::fetch_result`.
    pub file_name: String,
    /// Absolute or config-relative location on disk.
    pub path: PathBuf,
}

impl OutputRef {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { file_name, path }
    }
}

/// Where a stored file came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Upload,
    Output,
}

/// A file persisted in one of the storage directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: PathBuf,
    /// Last modification time; the sweeper ages files by this.
    pub created_at: SystemTime,
    pub origin: Origin,
}

impl StoredFile {
    /// List the regular files directly inside `dir`.
    ///
    /// A missing directory yields an empty list. Entries that cannot be
    /// stat'ed are logged and left out.
    pub async fn scan(dir: &Path, origin: Origin) -> Result<Vec<StoredFile>, ConvertError> {
        Ok(Self::scan_counting(dir, origin).await?.0)
    }

    /// Like [`StoredFile::scan`], also returning how many entries were
    /// skipped because their metadata could not be read.
    ///
    /// `Err` only when the directory itself cannot be listed.
    pub async fn scan_counting(
        dir: &Path,
        origin: Origin,
    ) -> Result<(Vec<StoredFile>, usize), ConvertError> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
            Err(e) => return Err(ConvertError::io(dir, e)),
        };

        let mut files = Vec::new();
        let mut unreadable = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ConvertError::io(dir, e))?
        {
            let path = entry.path();
            let meta = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                // Removed between listing and stat.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!("Cannot stat {}: {}", path.display(), e);
                    unreadable += 1;
                    continue;
                }
            };
            match meta.modified() {
                Ok(created_at) => files.push(StoredFile {
                    path,
                    created_at,
                    origin,
                }),
                Err(e) => {
                    warn!("No modification time for {}: {}", path.display(), e);
                    unreadable += 1;
                }
            }
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok((files, unreadable))
    }
}

/// Liveness answer of `Converter::health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub message: String,
}

/// Counters from one retention sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Regular files examined.
    pub scanned: usize,
    /// Files removed because they exceeded the retention age.
    pub deleted: usize,
    /// Expired files that could not be removed.
    pub failed: usize,
}

impl std::ops::AddAssign for SweepReport {
    fn add_assign(&mut self, rhs: Self) {
        self.scanned += rhs.scanned;
        self.deleted += rhs.deleted;
        self.failed += rhs.failed;
    }
}
