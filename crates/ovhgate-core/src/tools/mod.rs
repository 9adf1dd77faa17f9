//! Tool layer: catalog, argument validation, dispatch and auditing
//!
//! Callers see a stable error code per failure. The mapping from the
//! normalized taxonomy is fixed: permission denials become
//! `permission-denied`, local validation failures become `invalid-params`,
//! everything else is `internal`.

use serde::Serialize;
use serde_json::Value;

use crate::http::error::{ErrorKind, OvhApiError};

pub mod audit;
pub mod catalog;
pub mod dispatch;
pub mod validation;

pub use audit::{AuditOutcome, AuditRecord, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use catalog::{catalog, find, ToolDefinition};
pub use dispatch::ToolDispatcher;
pub use validation::{prepare_call, PreparedCall};

/// Caller-visible error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolErrorCode {
    InvalidParams,
    PermissionDenied,
    Internal,
}

impl ToolErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolErrorCode::InvalidParams => "invalid-params",
            ToolErrorCode::PermissionDenied => "permission-denied",
            ToolErrorCode::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ToolErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed tool call as reported to the caller
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ToolError {
    pub code: ToolErrorCode,
    pub message: String,
    /// Normalized kind of the underlying failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
}

impl ToolError {
    pub fn unknown_tool(name: &str) -> Self {
        Self {
            code: ToolErrorCode::InvalidParams,
            message: format!("Unknown tool: {}", name),
            kind: None,
            http_status: None,
        }
    }
}

impl From<OvhApiError> for ToolError {
    fn from(err: OvhApiError) -> Self {
        let code = match err.kind() {
            ErrorKind::PermissionDenied => ToolErrorCode::PermissionDenied,
            ErrorKind::ValidationError => ToolErrorCode::InvalidParams,
            _ => ToolErrorCode::Internal,
        };
        Self {
            code,
            message: err.message().to_string(),
            kind: Some(err.kind()),
            http_status: Some(err.http_status()),
        }
    }
}

/// A successful tool call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutput {
    pub tool: String,
    pub status: u16,
    pub data: Value,
}
