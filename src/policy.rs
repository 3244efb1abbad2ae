//! Per-file sync decision policy.

use std::io;
use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::hasher::hash_file;

/// How the reconciler decides whether an existing destination file is
/// overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Always overwrite the destination.
    #[default]
    Mirror,
    /// Overwrite only when the source is strictly newer by mtime.
    Update,
    /// Never overwrite an existing destination file.
    Add,
    /// Overwrite only when content digests differ.
    Strict,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mirror => "mirror",
            Self::Update => "update",
            Self::Add => "add",
            Self::Strict => "strict",
        }
    }
}

/// Decide whether `src` must be copied over `dst` under `mode`.
///
/// A missing destination is copied in every mode. Update compares
/// modification times with strict greater-than, so equal mtimes do not
/// copy. Strict compares content digests and treats a hash failure on
/// either side as a difference. Metadata errors propagate; the caller
/// records them per file and continues.
pub async fn should_copy(src: &Path, dst: &Path, mode: SyncMode) -> io::Result<bool> {
    if !fs::try_exists(dst).await? {
        return Ok(true);
    }

    match mode {
        SyncMode::Mirror => Ok(true),
        SyncMode::Add => Ok(false),
        SyncMode::Update => {
            let src_mtime = fs::metadata(src).await?.modified()?;
            let dst_mtime = fs::metadata(dst).await?.modified()?;
            Ok(src_mtime > dst_mtime)
        }
        SyncMode::Strict => match (hash_file(src).await, hash_file(dst).await) {
            (Ok(src_digest), Ok(dst_digest)) => Ok(src_digest != dst_digest),
            // Unreadable content cannot be proven identical.
            _ => Ok(true),
        },
    }
}
