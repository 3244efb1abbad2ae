use thiserror::Error;

/// Errors that refuse or abort a run. Per-file copy failures are not
/// errors at this level; they are recorded in the run outcome and the
/// run continues.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing or invalid source/destination configuration. The run is
    /// refused before any file is touched.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A sync run was requested while another one is active.
    #[error("a sync run is already in progress")]
    RunConflict,

    /// The filesystem watcher could not attach. Realtime mode stays off.
    #[error("file watcher failed: {0}")]
    Watch(#[from] notify::Error),

    /// Catastrophic I/O failure, e.g. the source or destination root
    /// became inaccessible mid-run.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
