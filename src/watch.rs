//! Filesystem change watching for real-time sync.
//!
//! Raw notify events are normalized into [`ChangeEvent`]s and pushed
//! onto an ordered queue in the order the watcher produced them. The
//! queue is not deduplicated; rapid repeated events for the same path
//! all arrive, and last-write-wins at copy time.

use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }
}

/// A normalized create/modify/delete notification for a single path.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

impl ChangeEvent {
    /// Normalize a notify event, one [`ChangeEvent`] per affected path.
    ///
    /// Directory create/modify notifications are dropped (the walker
    /// builds directories as needed); delete notifications forward
    /// as-is, since the path no longer exists to classify and the
    /// consumer resolves against the mirrored destination.
    pub fn from_notify(event: &Event) -> Vec<ChangeEvent> {
        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Modify(_) => ChangeKind::Modified,
            EventKind::Remove(_) => ChangeKind::Deleted,
            _ => return Vec::new(),
        };

        event
            .paths
            .iter()
            .filter(|path| kind == ChangeKind::Deleted || !path.is_dir())
            .map(|path| ChangeEvent {
                kind,
                path: path.clone(),
            })
            .collect()
    }
}

/// Recursive watcher over a source tree, feeding an ordered event queue.
pub struct ChangeWatcher {
    inner: Option<RecommendedWatcher>,
    root: Option<PathBuf>,
}

impl Default for ChangeWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeWatcher {
    pub fn new() -> Self {
        Self {
            inner: None,
            root: None,
        }
    }

    /// Subscribe recursively under `root`. Starting while already
    /// watching is a no-op, not an error; the existing subscription
    /// keeps its sink.
    pub fn start(
        &mut self,
        root: &Path,
        sink: UnboundedSender<ChangeEvent>,
    ) -> Result<(), SyncError> {
        if self.inner.is_some() {
            return Ok(());
        }

        let mut watcher =
            notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    for change in ChangeEvent::from_notify(&event) {
                        // Receiver gone means realtime sync was shut down.
                        let _ = sink.send(change);
                    }
                }
            })?;

        watcher.watch(root, RecursiveMode::Recursive)?;

        self.inner = Some(watcher);
        self.root = Some(root.to_path_buf());
        Ok(())
    }

    /// Tear down the subscription. Dropping the notify watcher joins its
    /// backend before returning, so no event is emitted afterwards.
    pub fn stop(&mut self) {
        self.inner = None;
        self.root = None;
    }

    pub fn is_watching(&self) -> bool {
        self.inner.is_some()
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }
}
