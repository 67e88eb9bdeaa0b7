//! Audit trail for browser-initiated transfers
//!
//! NIST 800-53: AU-2 (Audit Events), AU-3 (Content of Audit Records), AU-12 (Audit Generation)
//! Implementation: Every open, close, delete and rename is rendered as one
//! line in the format downstream log parsers already understand:
//!
//! ```text
//! <stream> OPEN Path=/bucket/alice/a.txt Mode=Read Interface=Web
//! <stream> CLOSE Path=/bucket/alice/a.txt BytesOut=42 Interface=Web
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::info;

/// Interface tag appended to every audit line
pub const INTERFACE: &str = "Web";

/// Open mode recorded for reads
pub const MODE_READ: &str = "Read";

/// Open mode recorded for uploads
pub const MODE_WRITE: &str = "CREATE|TRUNCATE|WRITE";

/// Byte-count direction of a CLOSE event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Bytes received from the user (upload)
    In,
    /// Bytes sent to the user (download)
    Out,
}

/// Audit event types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum AuditEvent {
    /// Object opened for reading or writing
    Open { path: String, mode: String },
    /// Object closed after transferring `bytes`
    Close {
        path: String,
        direction: Direction,
        bytes: u64,
    },
    /// Object deleted
    Delete { path: String },
    /// Object renamed
    Rename { path: String, new_path: String },
}

impl AuditEvent {
    /// Operation keyword used in the rendered line
    pub fn operation(&self) -> &'static str {
        match self {
            AuditEvent::Open { .. } => "OPEN",
            AuditEvent::Close { .. } => "CLOSE",
            AuditEvent::Delete { .. } => "DELETE",
            AuditEvent::Rename { .. } => "RENAME",
        }
    }

    /// Render the event as a log line for `stream`
    pub fn to_line(&self, stream: &str) -> String {
        let detail = match self {
            AuditEvent::Open { path, mode } => format!("Path={} Mode={}", path, mode),
            AuditEvent::Close {
                path,
                direction: Direction::In,
                bytes,
            } => format!("Path={} BytesIn={}", path, bytes),
            AuditEvent::Close {
                path,
                direction: Direction::Out,
                bytes,
            } => format!("Path={} BytesOut={}", path, bytes),
            AuditEvent::Delete { path } => format!("Path={}", path),
            AuditEvent::Rename { path, new_path } => format!("Path={} NewPath={}", path, new_path),
        };
        format!("{} {} {} Interface={}", stream, self.operation(), detail, INTERFACE)
    }

    /// Export as JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Destination for rendered audit lines
pub trait AuditSink: Send + Sync {
    fn publish(&self, line: &str, event: &AuditEvent, timestamp: DateTime<Utc>);
}

/// Emits audit lines through `tracing` under the `treeport::audit` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn publish(&self, line: &str, event: &AuditEvent, timestamp: DateTime<Utc>) {
        info!(
            target: "treeport::audit",
            event = event.operation(),
            timestamp = %timestamp,
            audit = ?event,
            "{}",
            line
        );
    }
}

/// Keeps every audit line in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryAuditSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines published so far
    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for MemoryAuditSink {
    fn publish(&self, line: &str, _event: &AuditEvent, _timestamp: DateTime<Utc>) {
        match self.lines.lock() {
            Ok(mut lines) => lines.push(line.to_string()),
            Err(poisoned) => poisoned.into_inner().push(line.to_string()),
        }
    }
}

/// Audit logger shared by the transports
#[derive(Clone)]
pub struct AuditLogger {
    stream: String,
    sink: Option<Arc<dyn AuditSink>>,
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("stream", &self.stream)
            .field("enabled", &self.sink.is_some())
            .finish()
    }
}

impl AuditLogger {
    pub fn new(stream: impl Into<String>, sink: Arc<dyn AuditSink>) -> Self {
        Self {
            stream: stream.into(),
            sink: Some(sink),
        }
    }

    /// Logger that drops every event
    pub fn disabled() -> Self {
        Self {
            stream: String::new(),
            sink: None,
        }
    }

    /// Logger configured from the `[audit]` section
    pub fn from_config(config: &treeport_core::AuditConfig) -> Self {
        if config.enabled {
            Self::new(config.stream.clone(), Arc::new(TracingAuditSink))
        } else {
            Self::disabled()
        }
    }

    pub fn record(&self, event: AuditEvent) {
        if let Some(sink) = &self.sink {
            let line = event.to_line(&self.stream);
            sink.publish(&line, &event, Utc::now());
        }
    }

    pub fn open(&self, path: impl Into<String>, mode: &str) {
        self.record(AuditEvent::Open {
            path: path.into(),
            mode: mode.to_string(),
        });
    }

    pub fn close(&self, path: impl Into<String>, direction: Direction, bytes: u64) {
        self.record(AuditEvent::Close {
            path: path.into(),
            direction,
            bytes,
        });
    }

    pub fn delete(&self, path: impl Into<String>) {
        self.record(AuditEvent::Delete { path: path.into() });
    }

    pub fn rename(&self, path: impl Into<String>, new_path: impl Into<String>) {
        self.record(AuditEvent::Rename {
            path: path.into(),
            new_path: new_path.into(),
        });
    }
}
