//! Two-pass tree reconciler.
//!
//! Pass 1 counts the files the active filter admits so progress has a
//! denominator. Pass 2 walks the same deterministic order (directories
//! before their contents, siblings sorted by name), mirrors the
//! directory skeleton, and reconciles each file through the policy and
//! transform. A per-file failure is recorded and the walk moves on.

use std::io;
use std::path::Path;

use filetime::FileTime;
use tokio::fs;
use walkdir::WalkDir;

use crate::engine::orchestrator::RunControl;
use crate::engine::types::{FileError, SyncOutcome, SyncTask};
use crate::error::SyncError;
use crate::policy::should_copy;
use crate::reporter::Reporter;
use crate::transform::ByteTransform;

/// Run the full reconciliation for a task. Bidirectional tasks run the
/// whole two-pass procedure twice, sequentially, with roles swapped, so
/// the reverse direction sees the forward direction's writes.
pub async fn run(
    task: &SyncTask,
    control: &RunControl,
    reporter: &Reporter,
) -> Result<SyncOutcome, SyncError> {
    let mut outcome = run_one_way(&task.source, &task.dest, task, control, reporter).await?;

    if task.bidirectional && !control.is_cancelled() {
        reporter.info("starting reverse pass");
        let reverse = run_one_way(&task.dest, &task.source, task, control, reporter).await?;
        outcome.merge(reverse);
    }

    Ok(outcome)
}

async fn run_one_way(
    src_root: &Path,
    dst_root: &Path,
    task: &SyncTask,
    control: &RunControl,
    reporter: &Reporter,
) -> Result<SyncOutcome, SyncError> {
    // An unreadable source root aborts the run; everything below it is
    // handled per entry.
    fs::metadata(src_root).await?;

    let mut outcome = SyncOutcome::default();

    let total = count_filtered_files(src_root, task);
    control.begin_pass(total);

    if total == 0 {
        reporter.warning(format!(
            "no files match filter '{}' under {}",
            task.filter.name(),
            src_root.display()
        ));
        return Ok(outcome);
    }

    let mut processed: u64 = 0;

    for entry in WalkDir::new(src_root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(src_root).to_path_buf();
                reporter.error(format!("cannot read {}: {e}", path.display()));
                outcome.errors.push(FileError::new(path, e));
                continue;
            }
        };

        let Ok(relative) = entry.path().strip_prefix(src_root) else {
            continue;
        };
        let target = dst_root.join(relative);

        if entry.file_type().is_dir() {
            // The mirrored directory must exist before any file in it.
            if let Err(e) = fs::create_dir_all(&target).await {
                if entry.depth() == 0 {
                    // The destination root itself is unusable.
                    return Err(SyncError::Io(e));
                }
                reporter.error(format!("cannot create {}: {e}", target.display()));
                outcome.errors.push(FileError::new(target, e));
            }
            continue;
        }

        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        if !task.filter.matches(&name) {
            continue;
        }

        if !pause_gate(control).await {
            reporter.warning("sync cancelled, stopping after current file");
            break;
        }

        match should_copy(entry.path(), &target, task.mode).await {
            Ok(true) => match copy_transformed(entry.path(), &target, task.transform).await {
                Ok(()) => outcome.files_copied += 1,
                Err(e) => {
                    reporter.error(format!("copy failed for {}: {e}", relative.display()));
                    outcome.errors.push(FileError::new(entry.path(), e));
                }
            },
            Ok(false) => outcome.files_skipped += 1,
            Err(e) => {
                reporter.error(format!("cannot compare {}: {e}", relative.display()));
                outcome.errors.push(FileError::new(entry.path(), e));
            }
        }

        processed += 1;
        control.record_processed(processed);
        let percent = ((processed * 100) / total) as u8;
        reporter.progress(percent, &name);
    }

    Ok(outcome)
}

/// Count the files the filter admits, in the same order pass 2 visits.
fn count_filtered_files(src_root: &Path, task: &SyncTask) -> u64 {
    WalkDir::new(src_root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| task.filter.matches(&e.file_name().to_string_lossy()))
        .count() as u64
}

/// Block while paused, polling at the control's configured interval.
/// Returns false when the run has been cancelled.
async fn pause_gate(control: &RunControl) -> bool {
    while control.is_paused() {
        if control.is_cancelled() {
            return false;
        }
        tokio::time::sleep(control.pause_poll()).await;
    }
    !control.is_cancelled()
}

/// Copy one file: read, transform, write, restore the source mtime so
/// later update-mode comparisons stay meaningful. The pause gate runs
/// before this, never inside it, so each file lands whole.
pub(crate) async fn copy_transformed(
    src: &Path,
    dst: &Path,
    transform: ByteTransform,
) -> io::Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut data = fs::read(src).await?;
    transform.apply(&mut data);
    fs::write(dst, &data).await?;

    let modified = fs::metadata(src).await?.modified()?;
    filetime::set_file_mtime(dst, FileTime::from_system_time(modified))?;
    Ok(())
}
