//! Logging setup for the ovhgate CLI
//!
//! This module provides:
//! - Session ID generation
//! - Credential redaction for anything printed or logged
//! - Operation timing spans
//! - Subscriber setup in compact, full or JSON format
//!
//! All log output goes to stderr. Stdout is reserved for results and the
//! serve protocol.

use crate::error::{Error, Result};
use is_terminal::IsTerminal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{field, Span};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Environment variable selecting the log format
pub const ENV_LOG_FORMAT: &str = "OVHGATE_LOG_FORMAT";

/// Session ID for this process
static SESSION_ID: OnceLock<String> = OnceLock::new();

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter
    pub level: String,
    /// Output format: compact, full, json
    pub format: LogFormat,
    /// Use ANSI colors when stderr is a terminal
    pub ansi: bool,
    /// Include thread IDs
    pub thread_ids: bool,
    /// Include file and line numbers
    pub source_location: bool,
    /// Per-module level overrides, e.g. `ovhgate_core::http = debug`
    pub module_filter: Option<HashMap<String, String>>,
}

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact format for production
    Compact,
    /// Full format with all details
    Full,
    /// JSON structured format
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "full" => Ok(LogFormat::Full),
            "json" => Ok(LogFormat::Json),
            other => Err(Error::config(format!("Invalid log format: {}", other))),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Compact,
            ansi: true,
            thread_ids: false,
            source_location: false,
            module_filter: None,
        }
    }
}

impl LoggingConfig {
    /// Create logging config from verbosity level
    pub fn from_verbosity(verbosity: u8) -> Self {
        let mut config = Self::default();

        match verbosity {
            0 => {
                config.level = "warn".to_string();
            }
            1 => {
                config.level = "info".to_string();
            }
            2 => {
                config.level = "debug".to_string();
                config.source_location = true;
            }
            _ => {
                config.level = "trace".to_string();
                config.format = LogFormat::Full;
                config.source_location = true;
                config.thread_ids = true;
            }
        }

        config
    }

    /// Apply a config file's logging section on top of the verbosity defaults
    ///
    /// Explicit `-v` flags win over the file's level.
    pub fn merge_file(&mut self, file: &LoggingConfig, verbosity: u8) {
        if verbosity == 0 {
            self.level = file.level.clone();
        }
        self.format = file.format;
        self.ansi = file.ansi;
        if file.module_filter.is_some() {
            self.module_filter = file.module_filter.clone();
        }
    }

    /// Apply environment overrides
    pub fn merge_with_env(&mut self) {
        self.merge_with_lookup(|key| std::env::var(key).ok());
    }

    fn merge_with_lookup<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        // RUST_LOG takes precedence
        if let Some(rust_log) = lookup("RUST_LOG") {
            self.level = rust_log;
        }

        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            match format.parse() {
                Ok(format) => self.format = format,
                Err(_) => tracing::warn!("Invalid log format: {}, using default", format),
            }
        }
    }
}

/// Initialize the global logging system
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let env_filter = create_env_filter(&config)?;
    let ansi = config.ansi && std::io::stderr().is_terminal();

    // One arm per format to keep the subscriber types apart
    match config.format {
        LogFormat::Compact => {
            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_ansi(ansi)
                .with_thread_ids(config.thread_ids)
                .with_file(config.source_location)
                .with_line_number(config.source_location)
                .compact()
                .finish();

            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| Error::other(format!("Failed to initialize logging: {}", e)))?;
        }
        LogFormat::Json => {
            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_ansi(false)
                .with_thread_ids(config.thread_ids)
                .with_file(config.source_location)
                .with_line_number(config.source_location)
                .json()
                .finish();

            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| Error::other(format!("Failed to initialize logging: {}", e)))?;
        }
        LogFormat::Full => {
            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_ansi(ansi)
                .with_thread_ids(config.thread_ids)
                .with_file(config.source_location)
                .with_line_number(config.source_location)
                .finish();

            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| Error::other(format!("Failed to initialize logging: {}", e)))?;
        }
    }

    let session_id = generate_session_id();
    SESSION_ID
        .set(session_id.clone())
        .map_err(|_| Error::other("Logging was already initialized"))?;

    tracing::debug!(
        session_id = %session_id,
        level = %config.level,
        format = ?config.format,
        "Logging system initialized"
    );

    Ok(())
}

/// Create environment filter based on configuration
fn create_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let mut filter = EnvFilter::try_new(&config.level)
        .map_err(|e| Error::config(format!("Invalid log level '{}': {}", config.level, e)))?;

    if let Some(module_filters) = &config.module_filter {
        for (module, level) in module_filters {
            filter = filter.add_directive(
                format!("{}={}", module, level)
                    .parse()
                    .map_err(|e| Error::config(format!("Invalid filter directive: {}", e)))?,
            );
        }
    }

    Ok(filter)
}

/// Generate a unique ID for this session
pub fn generate_session_id() -> String {
    format!("ses_{}", Uuid::new_v4().simple())
}

pub fn current_session_id() -> Option<&'static str> {
    SESSION_ID.get().map(|s| s.as_str())
}

/// Create a span with session ID and timing
pub fn create_operation_span(operation: &str, details: Option<&str>) -> Span {
    tracing::info_span!(
        "operation",
        operation = operation,
        session_id = current_session_id().unwrap_or("unknown"),
        details = details.unwrap_or(""),
        duration_ms = field::Empty,
    )
}

/// Credential redaction
pub mod redaction {
    use regex::Regex;
    use std::sync::OnceLock;

    static BEARER_REGEX: OnceLock<Regex> = OnceLock::new();
    static KEY_VALUE_REGEX: OnceLock<Regex> = OnceLock::new();
    static OVH_HEADER_REGEX: OnceLock<Regex> = OnceLock::new();

    fn bearer() -> &'static Regex {
        BEARER_REGEX.get_or_init(|| Regex::new(r"(?i)\b(bearer)\s+[A-Za-z0-9._~+/=-]+").unwrap())
    }

    fn key_value() -> &'static Regex {
        KEY_VALUE_REGEX.get_or_init(|| {
            Regex::new(
                r#"(?i)\b(token|access_token|client_secret|application_secret|consumer_key|secret|password)["']?\s*[=:]\s*["']?[^\s"',&}]{3,}["']?"#,
            )
            .unwrap()
        })
    }

    fn ovh_header() -> &'static Regex {
        OVH_HEADER_REGEX.get_or_init(|| {
            Regex::new(r"(?i)\b(x-ovh-(?:consumer|signature))\s*[=:]\s*\S+").unwrap()
        })
    }

    /// Redact credential material from a string
    pub fn redact_sensitive(input: &str) -> String {
        let result = bearer().replace_all(input, "$1 ***");
        let result = key_value().replace_all(&result, "$1=***");
        let result = ovh_header().replace_all(&result, "$1: ***");
        result.into_owned()
    }

    /// Redact credential material from JSON values
    pub fn redact_json_value(value: &mut serde_json::Value) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    if is_sensitive_key(key) {
                        *val = serde_json::Value::String("***".to_string());
                    } else {
                        redact_json_value(val);
                    }
                }
            }
            serde_json::Value::Array(arr) => {
                for item in arr.iter_mut() {
                    redact_json_value(item);
                }
            }
            serde_json::Value::String(s) => {
                *s = redact_sensitive(s);
            }
            _ => {}
        }
    }

    /// Check if a JSON key names credential material
    pub fn is_sensitive_key(key: &str) -> bool {
        let key_lower = key.to_lowercase();
        key_lower.contains("token")
            || key_lower.contains("secret")
            || key_lower.contains("password")
            || key_lower.contains("authorization")
            || key_lower.contains("signature")
            || key_lower == "consumer_key"
            || key_lower == "consumerkey"
            || key_lower == "x-ovh-consumer"
    }
}

/// Performance timing utilities
pub mod timing {
    use std::time::Instant;
    use tracing::Span;

    /// A timer that logs its duration when finished or dropped
    pub struct Timer {
        start: Instant,
        span: Span,
        operation: String,
        finished: bool,
    }

    impl Timer {
        pub fn new(operation: &str) -> Self {
            Self::build(operation, None)
        }

        pub fn with_details(operation: &str, details: &str) -> Self {
            Self::build(operation, Some(details))
        }

        fn build(operation: &str, details: Option<&str>) -> Self {
            Self {
                start: Instant::now(),
                span: super::create_operation_span(operation, details),
                operation: operation.to_string(),
                finished: false,
            }
        }

        /// Finish the timer and log the duration
        pub fn finish(mut self) {
            let duration = self.start.elapsed();
            self.span.record("duration_ms", duration.as_millis() as u64);
            tracing::info!(
                operation = %self.operation,
                duration_ms = duration.as_millis() as u64,
                "Operation completed"
            );
            self.finished = true;
        }
    }

    impl Drop for Timer {
        fn drop(&mut self) {
            if self.finished {
                return;
            }
            let duration = self.start.elapsed();
            self.span.record("duration_ms", duration.as_millis() as u64);
            tracing::debug!(
                operation = %self.operation,
                duration_ms = duration.as_millis() as u64,
                "Operation ended without finishing"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redaction() {
        let input = "Authorization: Bearer eyJhbGciOi.abc token=tok_1234567 client_secret: s3cr3t!";
        let redacted = redaction::redact_sensitive(input);
        assert!(redacted.contains("Bearer ***"));
        assert!(redacted.contains("token=***"));
        assert!(redacted.contains("client_secret=***"));
        assert!(!redacted.contains("eyJhbGciOi"));
        assert!(!redacted.contains("tok_1234567"));
        assert!(!redacted.contains("s3cr3t!"));
    }

    #[test]
    fn test_ovh_header_redaction() {
        let redacted = redaction::redact_sensitive("X-Ovh-Signature: $1$abcdef X-Ovh-Consumer=ck123");
        assert!(!redacted.contains("$1$abcdef"));
        assert!(!redacted.contains("ck123"));
    }

    #[test]
    fn test_plain_text_is_untouched() {
        let input = "GET /hosting/web/example.com failed: HTTP 404";
        assert_eq!(redaction::redact_sensitive(input), input);
    }

    #[test]
    fn test_json_redaction() {
        let mut value = serde_json::json!({
            "tool": "get_domain",
            "token": "abc",
            "arguments": {
                "domain": "example.com",
                "client_secret": "xyz"
            },
            "headers": [{"authorization": "Bearer abc"}]
        });

        redaction::redact_json_value(&mut value);

        assert_eq!(value["tool"], "get_domain");
        assert_eq!(value["token"], "***");
        assert_eq!(value["arguments"]["domain"], "example.com");
        assert_eq!(value["arguments"]["client_secret"], "***");
        assert_eq!(value["headers"][0]["authorization"], "***");
    }

    #[test]
    fn test_logging_config_from_verbosity() {
        let config = LoggingConfig::from_verbosity(0);
        assert_eq!(config.level, "warn");
        assert!(!config.source_location);

        let config = LoggingConfig::from_verbosity(2);
        assert_eq!(config.level, "debug");
        assert!(config.source_location);

        let config = LoggingConfig::from_verbosity(3);
        assert_eq!(config.level, "trace");
        assert_eq!(config.format, LogFormat::Full);
        assert!(config.thread_ids);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = LoggingConfig::from_verbosity(1);
        config.merge_with_lookup(|key| match key {
            "RUST_LOG" => Some("ovhgate_core=trace".to_string()),
            ENV_LOG_FORMAT => Some("JSON".to_string()),
            _ => None,
        });
        assert_eq!(config.level, "ovhgate_core=trace");
        assert_eq!(config.format, LogFormat::Json);

        config.merge_with_lookup(|key| (key == ENV_LOG_FORMAT).then(|| "fancy".to_string()));
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_file_level_only_applies_without_flags() {
        let file = LoggingConfig {
            level: "info".to_string(),
            format: LogFormat::Json,
            ..LoggingConfig::default()
        };

        let mut quiet = LoggingConfig::from_verbosity(0);
        quiet.merge_file(&file, 0);
        assert_eq!(quiet.level, "info");
        assert_eq!(quiet.format, LogFormat::Json);

        let mut verbose = LoggingConfig::from_verbosity(2);
        verbose.merge_file(&file, 2);
        assert_eq!(verbose.level, "debug");
    }

    #[test]
    fn test_session_id_shape() {
        let id = generate_session_id();
        assert!(id.starts_with("ses_"));
        assert_eq!(id.len(), 4 + 32);
    }
}
