//! HTTP error classification and normalization
//!
//! Every failure the request pipeline can observe (remote HTTP error,
//! timeout, connection failure, local input problem, credential failure)
//! is normalized into a single [`OvhApiError`] carrying a closed
//! [`ErrorKind`] and a `retryable` flag.

use std::fmt;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::auth::AuthError;

/// Boxed error used as the optional cause of an [`OvhApiError`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Normalized failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// 400 - the remote API rejected the parameters
    InvalidParams,
    /// 401/403, or a credential strategy failure
    PermissionDenied,
    /// 404
    ResourceNotFound,
    /// 429
    RateLimited,
    /// 503
    ServiceUnavailable,
    /// Other 5xx, unexpected statuses and undecodable responses
    Internal,
    /// The attempt exceeded the request timeout
    Timeout,
    /// No HTTP response was received at all
    NetworkError,
    /// A locally detected input problem
    ValidationError,
}

impl ErrorKind {
    /// Stable machine-readable code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidParams => "invalid-params",
            ErrorKind::PermissionDenied => "permission-denied",
            ErrorKind::ResourceNotFound => "resource-not-found",
            ErrorKind::RateLimited => "rate-limited",
            ErrorKind::ServiceUnavailable => "service-unavailable",
            ErrorKind::Internal => "internal",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NetworkError => "network-error",
            ErrorKind::ValidationError => "validation-error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized API error
///
/// Constructed once where the failure is detected and never mutated
/// afterwards. The message never contains credential material.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct OvhApiError {
    message: String,
    http_status: u16,
    remote_error_code: Option<String>,
    kind: ErrorKind,
    retryable: bool,
    #[source]
    source: Option<BoxError>,
}

impl OvhApiError {
    /// Classify a non-2xx HTTP response from its status and body text
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let details = serde_json::from_str::<Value>(body).ok();
        let (remote_error_code, message) = Self::extract_remote_error(details.as_ref());
        let (kind, retryable) = Self::classify_status(status);

        Self {
            message: message.unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            http_status: status.as_u16(),
            remote_error_code,
            kind,
            retryable,
            source: None,
        }
    }

    /// Transport-level timeout (status 0, always retryable)
    pub fn timeout(after: std::time::Duration) -> Self {
        Self {
            message: format!("Request timed out after {}ms", after.as_millis()),
            http_status: 0,
            remote_error_code: None,
            kind: ErrorKind::Timeout,
            retryable: true,
            source: None,
        }
    }

    /// Connection failure with no HTTP response (status 0, retryable)
    pub fn network(error: reqwest::Error) -> Self {
        let error = error.without_url();
        Self {
            message: format!("Network error: {}", error),
            http_status: 0,
            remote_error_code: None,
            kind: ErrorKind::NetworkError,
            retryable: true,
            source: Some(Box::new(error)),
        }
    }

    /// Locally detected input problem (status 0, never retryable)
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            http_status: 0,
            remote_error_code: None,
            kind: ErrorKind::ValidationError,
            retryable: false,
            source: None,
        }
    }

    /// Credential strategy failure, surfaced as a non-retryable permission denial
    pub fn authentication(error: AuthError) -> Self {
        Self {
            message: format!("Authentication failed: {}", error),
            http_status: 0,
            remote_error_code: None,
            kind: ErrorKind::PermissionDenied,
            retryable: false,
            source: Some(Box::new(error)),
        }
    }

    /// A 2xx response whose body did not match the expected shape
    pub fn decode(status: u16, error: serde_json::Error) -> Self {
        Self {
            message: format!("Failed to decode response body: {}", error),
            http_status: status,
            remote_error_code: None,
            kind: ErrorKind::Internal,
            retryable: false,
            source: Some(Box::new(error)),
        }
    }

    /// Status-to-kind table shared by every response classification
    pub fn classify_status(status: StatusCode) -> (ErrorKind, bool) {
        match status.as_u16() {
            400 => (ErrorKind::InvalidParams, false),
            401 | 403 => (ErrorKind::PermissionDenied, false),
            404 => (ErrorKind::ResourceNotFound, false),
            429 => (ErrorKind::RateLimited, true),
            503 => (ErrorKind::ServiceUnavailable, true),
            500..=599 => (ErrorKind::Internal, true),
            _ => (ErrorKind::Internal, false),
        }
    }

    /// Pull `message` and the remote error code out of a JSON error body
    fn extract_remote_error(details: Option<&Value>) -> (Option<String>, Option<String>) {
        let Some(json) = details else {
            return (None, None);
        };

        let code = json
            .get("errorCode")
            .or_else(|| json.get("class"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string());
        let message = json
            .get("message")
            .and_then(|m| m.as_str())
            .map(|s| s.to_string());

        (code, message)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status, or 0 when no response was involved
    pub fn http_status(&self) -> u16 {
        self.http_status
    }

    pub fn remote_error_code(&self) -> Option<&str> {
        self.remote_error_code.as_deref()
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Stable normalized code, e.g. `rate-limited`
    pub fn code(&self) -> &'static str {
        self.kind.as_str()
    }

    /// Whether the failure may safely be attempted again
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }

    pub fn is_rate_limited(&self) -> bool {
        self.kind == ErrorKind::RateLimited
    }

    pub fn is_validation(&self) -> bool {
        self.kind == ErrorKind::ValidationError
    }
}
