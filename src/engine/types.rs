use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::filter::FileFilter;
use crate::policy::SyncMode;
use crate::transform::ByteTransform;

/// One sync invocation, snapshotted from the configuration when the run
/// starts and immutable for its duration.
#[derive(Debug, Clone)]
pub struct SyncTask {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub mode: SyncMode,
    /// Run the reconciliation a second time with roles swapped.
    pub bidirectional: bool,
    pub filter: FileFilter,
    pub transform: ByteTransform,
}

/// A copy or delete that failed for one file. The run continues past it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileError {
    pub path: PathBuf,
    pub message: String,
}

impl FileError {
    pub fn new(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Result of a completed (possibly cancelled) run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub files_copied: u64,
    pub files_skipped: u64,
    pub errors: Vec<FileError>,
}

impl SyncOutcome {
    /// Fold the counts of a second pass into this one.
    pub fn merge(&mut self, other: SyncOutcome) {
        self.files_copied += other.files_copied;
        self.files_skipped += other.files_skipped;
        self.errors.extend(other.errors);
    }
}
