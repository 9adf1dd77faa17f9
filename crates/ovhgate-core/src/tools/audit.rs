//! Audit trail for tool invocations
//!
//! The sink is constructed by the composition root and handed to the
//! dispatcher. Records never carry call arguments.

use std::fmt::Debug;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

/// Result of one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    Failure,
}

/// One audited tool invocation
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    pub tool: String,
    pub outcome: AuditOutcome,
    /// Caller-visible error code on failure
    pub code: Option<&'static str>,
    /// Normalized error kind on failure, when one was produced
    pub kind: Option<&'static str>,
    /// HTTP status of the final response, 0 when none was received
    pub http_status: Option<u16>,
    pub duration: Duration,
    pub timestamp: DateTime<Utc>,
}

/// Destination for audit records
pub trait AuditSink: Send + Sync + Debug {
    fn record(&self, record: AuditRecord);
}

/// Emits each record as a `tracing` event on the `audit` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: AuditRecord) {
        let duration_ms = record.duration.as_millis() as u64;
        match record.outcome {
            AuditOutcome::Success => info!(
                target: "audit",
                tool = %record.tool,
                outcome = "success",
                http_status = record.http_status,
                duration_ms,
                timestamp = %record.timestamp.to_rfc3339(),
                "tool call"
            ),
            AuditOutcome::Failure => warn!(
                target: "audit",
                tool = %record.tool,
                outcome = "failure",
                code = record.code,
                kind = record.kind,
                http_status = record.http_status,
                duration_ms,
                timestamp = %record.timestamp.to_rfc3339(),
                "tool call"
            ),
        }
    }
}

/// Keeps records in memory
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: AuditRecord) {
        self.records.lock().push(record);
    }
}
