//! Run coordination: one full-tree sync at a time, with cooperative
//! pause/resume/cancel and an optional periodic trigger.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ConfigHandle;
use crate::engine::types::{SyncOutcome, SyncTask};
use crate::engine::walker;
use crate::error::SyncError;
use crate::reporter::Reporter;

const STATE_IDLE: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_PAUSED: u8 = 2;

/// Default poll interval for the cooperative pause loop.
pub const DEFAULT_PAUSE_POLL: Duration = Duration::from_millis(500);

/// Shared run state, injected into workers. All transitions are single
/// atomic operations; there is no check-then-set window between seeing
/// Idle and claiming Running.
#[derive(Debug)]
pub struct RunControl {
    state: AtomicU8,
    total_files: AtomicU64,
    processed_files: AtomicU64,
    last_error: Mutex<Option<String>>,
    cancel: CancellationToken,
    pause_poll: Duration,
}

impl RunControl {
    pub fn new(pause_poll: Duration) -> Self {
        Self {
            state: AtomicU8::new(STATE_IDLE),
            total_files: AtomicU64::new(0),
            processed_files: AtomicU64::new(0),
            last_error: Mutex::new(None),
            cancel: CancellationToken::new(),
            pause_poll,
        }
    }

    /// Claim the run slot. Exactly one caller wins between two
    /// concurrent attempts.
    pub(crate) fn try_begin(&self) -> bool {
        self.state
            .compare_exchange(STATE_IDLE, STATE_RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn try_pause(&self) -> bool {
        self.state
            .compare_exchange(STATE_RUNNING, STATE_PAUSED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn try_resume(&self) -> bool {
        self.state
            .compare_exchange(STATE_PAUSED, STATE_RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn finish(&self) {
        self.state.store(STATE_IDLE, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::SeqCst) != STATE_IDLE
    }

    pub fn is_paused(&self) -> bool {
        self.state.load(Ordering::SeqCst) == STATE_PAUSED
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Request cooperative shutdown; in-flight file copies finish first.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Resolves once [`RunControl::cancel`] has been called.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub(crate) fn pause_poll(&self) -> Duration {
        self.pause_poll
    }

    pub(crate) fn begin_pass(&self, total: u64) {
        self.total_files.store(total, Ordering::SeqCst);
        self.processed_files.store(0, Ordering::SeqCst);
    }

    pub(crate) fn record_processed(&self, processed: u64) {
        self.processed_files.store(processed, Ordering::SeqCst);
    }

    fn set_last_error(&self, message: Option<String>) {
        *self.last_error.lock().unwrap() = message;
    }

    pub fn status(&self) -> RunStatus {
        let state = self.state.load(Ordering::SeqCst);
        RunStatus {
            running: state != STATE_IDLE,
            paused: state == STATE_PAUSED,
            total_files: self.total_files.load(Ordering::SeqCst),
            processed_files: self.processed_files.load(Ordering::SeqCst),
            last_error: self.last_error.lock().unwrap().clone(),
        }
    }
}

/// Point-in-time view of the run state, safe to hand to any caller.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatus {
    pub running: bool,
    pub paused: bool,
    pub total_files: u64,
    pub processed_files: u64,
    pub last_error: Option<String>,
}

/// Coordinates full-tree runs. Owns the state machine
/// Idle -> Running -> Idle, with Running <-> Paused in between.
pub struct SyncOrchestrator {
    control: Arc<RunControl>,
    reporter: Reporter,
}

impl SyncOrchestrator {
    pub fn new(reporter: Reporter) -> Self {
        Self::with_pause_poll(reporter, DEFAULT_PAUSE_POLL)
    }

    /// Constructor with an explicit pause poll interval; tests shrink it.
    pub fn with_pause_poll(reporter: Reporter, pause_poll: Duration) -> Self {
        Self {
            control: Arc::new(RunControl::new(pause_poll)),
            reporter,
        }
    }

    pub fn control(&self) -> Arc<RunControl> {
        self.control.clone()
    }

    pub fn status(&self) -> RunStatus {
        self.control.status()
    }

    /// Execute one full sync. Rejected with [`SyncError::RunConflict`]
    /// while another run is active; the claim is a single atomic
    /// transition, so two concurrent callers cannot both start.
    pub async fn run_once(&self, task: SyncTask) -> Result<SyncOutcome, SyncError> {
        if !self.control.try_begin() {
            self.reporter
                .warning("a sync run is already in progress, request ignored");
            return Err(SyncError::RunConflict);
        }

        self.control.set_last_error(None);
        self.reporter.info(format!(
            "sync started: {} -> {} ({} mode{})",
            task.source.display(),
            task.dest.display(),
            task.mode.as_str(),
            if task.bidirectional { ", bidirectional" } else { "" },
        ));

        let result = walker::run(&task, &self.control, &self.reporter).await;

        match &result {
            Ok(outcome) => {
                self.reporter.info(format!(
                    "sync finished: {} copied, {} skipped, {} errors",
                    outcome.files_copied,
                    outcome.files_skipped,
                    outcome.errors.len()
                ));
            }
            Err(e) => {
                self.control.set_last_error(Some(e.to_string()));
                self.reporter.error(format!("sync failed: {e}"));
            }
        }

        // Whatever happened, the run is over.
        self.reporter.progress(100, "");
        self.control.finish();

        result
    }

    /// No-op unless a run is active and not already paused.
    pub fn pause(&self) {
        if self.control.try_pause() {
            self.reporter.info("sync paused");
        }
    }

    /// No-op unless a run is paused.
    pub fn resume(&self) {
        if self.control.try_resume() {
            self.reporter.info("sync resumed");
        }
    }

    /// Cooperative cancel: the walker finishes its current file, then
    /// stops. Also stops the periodic trigger.
    pub fn cancel(&self) {
        self.control.cancel();
    }

    /// Spawn the interval trigger. Each tick re-reads the configuration
    /// so interval or root edits apply to the next scheduled run; a tick
    /// that lands while a run is active is rejected by the state guard.
    pub fn spawn_periodic(self: &Arc<Self>, config: ConfigHandle) -> JoinHandle<()> {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            loop {
                let minutes = { config.read().await.interval.max(1) };
                tokio::select! {
                    _ = orchestrator.control.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_secs(minutes * 60)) => {}
                }

                let task = {
                    let cfg = config.read().await;
                    match cfg.validate() {
                        Ok(()) => cfg.task(),
                        Err(e) => {
                            orchestrator
                                .reporter
                                .warning(format!("scheduled sync skipped: {e}"));
                            continue;
                        }
                    }
                };

                match orchestrator.run_once(task).await {
                    // The guard already produced the user notice.
                    Err(SyncError::RunConflict) => {}
                    Err(e) => orchestrator
                        .reporter
                        .error(format!("scheduled sync failed: {e}")),
                    Ok(_) => {}
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as std_fs;
    use tempfile::TempDir;

    use crate::filter::FilterLibrary;
    use crate::policy::SyncMode;
    use crate::transform::ByteTransform;

    fn task(source: &std::path::Path, dest: &std::path::Path) -> SyncTask {
        SyncTask {
            source: source.to_path_buf(),
            dest: dest.to_path_buf(),
            mode: SyncMode::Mirror,
            bidirectional: false,
            filter: FilterLibrary::new().compile("all"),
            transform: ByteTransform::Identity,
        }
    }

    #[test]
    fn test_run_claim_is_exclusive() {
        let control = RunControl::new(Duration::from_millis(10));

        assert!(control.try_begin());
        assert!(!control.try_begin());
        control.finish();
        assert!(control.try_begin());
        control.finish();
    }

    #[test]
    fn test_pause_resume_only_valid_from_matching_state() {
        let control = RunControl::new(Duration::from_millis(10));

        // Not running: pause and resume are rejected.
        assert!(!control.try_pause());
        assert!(!control.try_resume());

        assert!(control.try_begin());
        assert!(control.try_pause());
        assert!(control.is_paused());
        // Double pause is rejected, as is begin while paused.
        assert!(!control.try_pause());
        assert!(!control.try_begin());

        assert!(control.try_resume());
        assert!(!control.is_paused());
        assert!(control.is_running());
        control.finish();
    }

    #[tokio::test]
    async fn test_run_once_returns_to_idle() -> anyhow::Result<()> {
        let src = TempDir::new()?;
        let dst = TempDir::new()?;
        std_fs::write(src.path().join("f.txt"), b"data")?;

        let orchestrator = SyncOrchestrator::new(Reporter::null());
        let outcome = orchestrator.run_once(task(src.path(), dst.path())).await?;

        assert_eq!(outcome.files_copied, 1);
        let status = orchestrator.status();
        assert!(!status.running);
        assert!(!status.paused);
        assert!(status.last_error.is_none());

        // A second sequential run is accepted again.
        let outcome = orchestrator.run_once(task(src.path(), dst.path())).await?;
        assert_eq!(outcome.files_copied, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_run_records_error_and_idles() {
        let dst = TempDir::new().unwrap();
        let orchestrator = SyncOrchestrator::new(Reporter::null());

        let result = orchestrator
            .run_once(task(std::path::Path::new("/nonexistent/root"), dst.path()))
            .await;

        assert!(matches!(result, Err(SyncError::Io(_))));
        let status = orchestrator.status();
        assert!(!status.running);
        assert!(status.last_error.is_some());
    }

    #[tokio::test]
    async fn test_final_progress_is_forced_to_100() -> anyhow::Result<()> {
        let src = TempDir::new()?;
        let dst = TempDir::new()?;
        std_fs::write(src.path().join("f.txt"), b"data")?;

        let (reporter, mut rx) = Reporter::channel();
        let orchestrator = SyncOrchestrator::new(reporter);
        orchestrator.run_once(task(src.path(), dst.path())).await?;
        drop(orchestrator);

        let mut last_percent = None;
        while let Ok(event) = rx.try_recv() {
            if let crate::reporter::EngineEvent::Progress { percent, .. } = event {
                last_percent = Some(percent);
            }
        }
        assert_eq!(last_percent, Some(100));
        Ok(())
    }
}
