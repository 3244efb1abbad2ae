//! Persisted configuration document.
//!
//! Loaded at startup, saved on every settings mutation. All fields have
//! defaults so a partial document loads cleanly over them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::engine::types::SyncTask;
use crate::error::SyncError;
use crate::filter::{FilterLibrary, FILTER_ALL};
use crate::policy::SyncMode;
use crate::transform::ByteTransform;

/// Default auto-sync interval in minutes.
pub const DEFAULT_INTERVAL_MINUTES: u64 = 5;
/// Default XOR key when encryption is enabled.
pub const DEFAULT_XOR_KEY: u8 = 0x55;

/// Shared handle read by the orchestrator's periodic task and the
/// realtime consumer, so settings edits take effect on the next
/// scheduled run and the next consumed event.
pub type ConfigHandle = Arc<RwLock<AppConfig>>;

pub fn shared(config: AppConfig) -> ConfigHandle {
    Arc::new(RwLock::new(config))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub src: PathBuf,
    pub dst: PathBuf,
    pub mode: SyncMode,
    /// Auto-sync interval in minutes, at least 1.
    pub interval: u64,
    /// Named filter sets; overlays the built-ins on load.
    pub filters: BTreeMap<String, Vec<String>>,
    /// Name of the filter applied to runs and realtime events.
    pub active_filter: String,
    pub realtime: bool,
    pub bidirectional: bool,
    pub encryption: bool,
    pub encryption_key: u8,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            src: PathBuf::new(),
            dst: PathBuf::new(),
            mode: SyncMode::Mirror,
            interval: DEFAULT_INTERVAL_MINUTES,
            filters: BTreeMap::new(),
            active_filter: FILTER_ALL.to_string(),
            realtime: false,
            bidirectional: false,
            encryption: false,
            encryption_key: DEFAULT_XOR_KEY,
        }
    }
}

impl AppConfig {
    /// Read the document from disk. A missing file yields the defaults;
    /// a malformed one is a configuration error.
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| SyncError::Config(format!("cannot parse {}: {e}", path.display())))
    }

    /// Write the document back as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), SyncError> {
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| SyncError::Config(format!("cannot serialize configuration: {e}")))?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// Refuse a run before any file is touched when the roots or the
    /// interval are unusable.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.src.as_os_str().is_empty() {
            return Err(SyncError::Config("source directory not set".to_string()));
        }
        if self.dst.as_os_str().is_empty() {
            return Err(SyncError::Config("destination directory not set".to_string()));
        }
        if !self.src.is_dir() {
            return Err(SyncError::Config(format!(
                "source directory does not exist: {}",
                self.src.display()
            )));
        }
        if self.interval < 1 {
            return Err(SyncError::Config(
                "auto-sync interval must be at least 1 minute".to_string(),
            ));
        }
        Ok(())
    }

    /// Filter library seeded from the built-ins and this document.
    pub fn filter_library(&self) -> FilterLibrary {
        FilterLibrary::from_config(&self.filters)
    }

    pub fn transform(&self) -> ByteTransform {
        ByteTransform::from_config(self.encryption, self.encryption_key)
    }

    /// Snapshot this configuration into an immutable task for one run.
    pub fn task(&self) -> SyncTask {
        SyncTask {
            source: self.src.clone(),
            dest: self.dst.clone(),
            mode: self.mode,
            bidirectional: self.bidirectional,
            filter: self.filter_library().compile(&self.active_filter),
            transform: self.transform(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load(&dir.path().join("config.json")).unwrap();

        assert_eq!(config.interval, DEFAULT_INTERVAL_MINUTES);
        assert_eq!(config.mode, SyncMode::Mirror);
        assert_eq!(config.active_filter, FILTER_ALL);
        assert!(!config.encryption);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.src = dir.path().join("source");
        config.dst = dir.path().join("backup");
        config.mode = SyncMode::Update;
        config.bidirectional = true;
        config.encryption = true;
        config.encryption_key = 0x42;
        config
            .filters
            .insert("custom".to_string(), vec![".log".to_string()]);

        config.save(&path).unwrap();
        let restored = AppConfig::load(&path).unwrap();

        assert_eq!(restored.src, config.src);
        assert_eq!(restored.mode, SyncMode::Update);
        assert!(restored.bidirectional);
        assert_eq!(restored.encryption_key, 0x42);
        assert_eq!(restored.filters, config.filters);
    }

    #[test]
    fn test_partial_document_loads_over_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"mode": "strict", "interval": 30}"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.mode, SyncMode::Strict);
        assert_eq!(config.interval, 30);
        assert_eq!(config.encryption_key, DEFAULT_XOR_KEY);
    }

    #[test]
    fn test_invalid_mode_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"mode": "sideways"}"#).unwrap();

        assert!(matches!(
            AppConfig::load(&path),
            Err(SyncError::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_unset_roots() {
        let config = AppConfig::default();
        assert!(matches!(config.validate(), Err(SyncError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_missing_source() {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.src = dir.path().join("does-not-exist");
        config.dst = dir.path().to_path_buf();

        assert!(matches!(config.validate(), Err(SyncError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.src = dir.path().to_path_buf();
        config.dst = dir.path().to_path_buf();
        config.interval = 0;

        assert!(matches!(config.validate(), Err(SyncError::Config(_))));
    }

    #[test]
    fn test_task_snapshot_uses_active_filter() {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.src = dir.path().to_path_buf();
        config.dst = dir.path().to_path_buf();
        config.active_filter = "images".to_string();
        config.encryption = true;

        let task = config.task();
        assert!(task.filter.matches("photo.jpg"));
        assert!(!task.filter.matches("notes.txt"));
        assert!(!task.transform.is_identity());
    }
}
