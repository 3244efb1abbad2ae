//! Queue consumer for real-time change events.
//!
//! A single task drains the change-event queue in FIFO order and
//! translates each event into an incremental action against the
//! destination. The configuration is re-read for every event, so root
//! or mode edits apply from the next event onward.

use std::io;

use tokio::fs;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

use crate::config::ConfigHandle;
use crate::engine::walker::copy_transformed;
use crate::policy::should_copy;
use crate::reporter::Reporter;
use crate::watch::{ChangeEvent, ChangeKind};

pub struct QueueConsumer {
    rx: UnboundedReceiver<ChangeEvent>,
    config: ConfigHandle,
    reporter: Reporter,
    cancel: CancellationToken,
}

impl QueueConsumer {
    pub fn new(
        rx: UnboundedReceiver<ChangeEvent>,
        config: ConfigHandle,
        reporter: Reporter,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            rx,
            config,
            reporter,
            cancel,
        }
    }

    /// Drain events until cancelled or the queue's senders are gone.
    /// Handling failures are logged; the loop never terminates on them.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                event = self.rx.recv() => {
                    let Some(event) = event else { break };
                    if let Err(e) = self.handle(&event).await {
                        self.reporter.error(format!(
                            "realtime {} failed for {}: {e}",
                            event.kind.as_str(),
                            event.path.display()
                        ));
                    }
                }
            }
        }
    }

    async fn handle(&self, event: &ChangeEvent) -> io::Result<()> {
        // Snapshot the configuration at consumption time, not enqueue
        // time.
        let (src_root, dst_root, mode, filter, transform) = {
            let cfg = self.config.read().await;
            if cfg.src.as_os_str().is_empty() || cfg.dst.as_os_str().is_empty() {
                return Ok(());
            }
            (
                cfg.src.clone(),
                cfg.dst.clone(),
                cfg.mode,
                cfg.filter_library().compile(&cfg.active_filter),
                cfg.transform(),
            )
        };

        // Events outside the currently configured source tree are stale.
        let Ok(relative) = event.path.strip_prefix(&src_root) else {
            return Ok(());
        };
        let target = dst_root.join(relative);

        match event.kind {
            ChangeKind::Created | ChangeKind::Modified => {
                let name = event
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                if !filter.matches(&name) {
                    return Ok(());
                }
                if should_copy(&event.path, &target, mode).await? {
                    copy_transformed(&event.path, &target, transform).await?;
                    self.reporter
                        .info(format!("realtime: updated {}", relative.display()));
                }
            }
            ChangeKind::Deleted => match fs::metadata(&target).await {
                Ok(meta) if meta.is_dir() => {
                    fs::remove_dir_all(&target).await?;
                    self.reporter
                        .info(format!("realtime: removed directory {}", relative.display()));
                }
                Ok(_) => {
                    fs::remove_file(&target).await?;
                    self.reporter
                        .info(format!("realtime: removed {}", relative.display()));
                }
                // Nothing mirrored at the target: not an error.
                Err(_) => {}
            },
        }

        Ok(())
    }
}
