//! Leveled log records captured from a running program.
//!
//! Every diagnostic call a program makes during its run is converted into
//! exactly one [`LogRecord`] and handed to the host's sink synchronously,
//! so consumers observe records in strict call order. Hosts filter by
//! level to implement verbosity tiers; a "concise" view typically keeps
//! only `info` and `error`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Severity class of a captured diagnostic call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Ordinary program output.
    Info,
    /// Program-reported failure.
    Error,
    /// Program-reported anomaly, and the core's own swallowed defects.
    Warn,
    /// Lifecycle notices emitted by the executor itself, not the program.
    System,
    /// Debug-level chatter, hidden by concise views.
    Verbose,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogLevel::Info => "info",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::System => "system",
            LogLevel::Verbose => "verbose",
        };
        f.write_str(name)
    }
}

/// One captured diagnostic call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    /// Position in the run's log stream, starting at 0.
    pub id: u64,
    /// Severity class, serialized as `type` for host-side filtering.
    #[serde(rename = "type")]
    pub level: LogLevel,
    /// The formatted message text.
    pub content: String,
    /// Epoch milliseconds at capture time.
    pub timestamp: i64,
}

/// Host-side consumer of the live log stream.
pub type LogSink = Arc<dyn Fn(LogRecord) + Send + Sync>;

/// Produces ordered records for one run and pushes them at the sink.
#[derive(Clone)]
pub struct LogEmitter {
    seq: Arc<AtomicU64>,
    sink: LogSink,
}

impl LogEmitter {
    /// Wrap a sink with a fresh sequence counter.
    pub fn new(sink: LogSink) -> Self {
        Self {
            seq: Arc::new(AtomicU64::new(0)),
            sink,
        }
    }

    /// Stamp and deliver one record.
    pub fn emit(&self, level: LogLevel, message: impl Into<String>) {
        let record = LogRecord {
            id: self.seq.fetch_add(1, Ordering::SeqCst),
            level,
            content: message.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        };
        (self.sink)(record);
    }
}

impl std::fmt::Debug for LogEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogEmitter")
            .field("seq", &self.seq.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
