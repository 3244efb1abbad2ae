//! Progress and log reporting.
//!
//! Workers never touch presentation state directly. They push
//! [`EngineEvent`]s through an unbounded channel to a single consumer
//! that owns the progress bar, the log file, or whatever the caller
//! renders with. Events from one worker arrive in the order they were
//! sent.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Default cap for the in-memory log ring.
pub const DEFAULT_MAX_LOG_LINES: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC3339 UTC timestamp.
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level,
            message: message.into(),
        }
    }
}

/// Event emitted by the engine workers.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Progress through the current pass, 0..=100, with the file most
    /// recently processed.
    Progress { percent: u8, file: String },
    Log(LogEntry),
}

/// Cloneable sending half handed to every worker.
#[derive(Debug, Clone)]
pub struct Reporter {
    tx: UnboundedSender<EngineEvent>,
}

impl Reporter {
    /// Create a reporter and the receiving end for the presentation
    /// consumer.
    pub fn channel() -> (Self, UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Reporter whose events go nowhere. Handy for tests.
    pub fn null() -> Self {
        let (reporter, _rx) = Self::channel();
        reporter
    }

    pub fn progress(&self, percent: u8, file: &str) {
        self.send(EngineEvent::Progress {
            percent,
            file: file.to_string(),
        });
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.send(EngineEvent::Log(LogEntry::new(level, message)));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// A closed receiver means the presentation side is gone; workers
    /// keep running, the event is dropped.
    fn send(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Bounded in-memory log store for the consumer side. Oldest entries
/// are evicted once the cap is reached.
#[derive(Debug)]
pub struct LogBuffer {
    entries: Mutex<VecDeque<LogEntry>>,
    max_lines: usize,
}

impl LogBuffer {
    pub fn new(max_lines: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(max_lines.min(1024))),
            max_lines,
        }
    }

    pub fn push(&self, entry: LogEntry) {
        let mut entries = self.entries.lock().unwrap();
        entries.push_back(entry);
        while entries.len() > self.max_lines {
            entries.pop_front();
        }
    }

    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_buffer_rotation() {
        let buffer = LogBuffer::new(3);

        for i in 0..5 {
            buffer.push(LogEntry::new(LogLevel::Info, format!("message {i}")));
        }

        let entries = buffer.snapshot();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].message, "message 2");
        assert_eq!(entries[2].message, "message 4");
    }

    #[tokio::test]
    async fn test_events_arrive_in_send_order() {
        let (reporter, mut rx) = Reporter::channel();

        reporter.info("first");
        reporter.progress(50, "a.txt");
        reporter.error("second");
        drop(reporter);

        match rx.recv().await {
            Some(EngineEvent::Log(entry)) => assert_eq!(entry.message, "first"),
            other => panic!("unexpected event: {other:?}"),
        }
        match rx.recv().await {
            Some(EngineEvent::Progress { percent, file }) => {
                assert_eq!(percent, 50);
                assert_eq!(file, "a.txt");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        match rx.recv().await {
            Some(EngineEvent::Log(entry)) => {
                assert_eq!(entry.level, LogLevel::Error);
                assert_eq!(entry.message, "second");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_send_after_receiver_dropped_is_silent() {
        let (reporter, rx) = Reporter::channel();
        drop(rx);
        // Must not panic or error.
        reporter.info("nobody listening");
        reporter.progress(100, "");
    }
}
