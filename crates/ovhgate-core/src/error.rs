//! Error types for the ovhgate core library
//!
//! Request-level failures use the normalized [`OvhApiError`]; this module
//! wraps it together with configuration and serialization failures for the
//! crate's public `Result`.

use thiserror::Error;

use crate::http::error::OvhApiError;

/// Main error type for ovhgate operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// A normalized remote API failure
    #[error(transparent)]
    Api(#[from] OvhApiError),

    /// JSON parsing and serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// HTTP client construction errors
    #[error("HTTP client error: {message}")]
    HttpClient {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Generic internal error with context
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Configuration {
            message: message.into(),
            source: Some(anyhow::Error::new(source)),
        }
    }

    /// The API error, when this is one
    pub fn as_api(&self) -> Option<&OvhApiError> {
        match self {
            Error::Api(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal {
            message: err.to_string(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_error_display() {
        let err = Error::config("OVH_CLIENT_SECRET is required");
        assert_eq!(
            err.to_string(),
            "Configuration error: OVH_CLIENT_SECRET is required"
        );
    }

    #[test]
    fn test_api_error_is_transparent() {
        let api = OvhApiError::from_response(StatusCode::NOT_FOUND, r#"{"message":"gone"}"#);
        let err: Error = api.into();
        assert_eq!(err.to_string(), "gone");
        assert_eq!(err.as_api().map(|e| e.code()), Some("resource-not-found"));
    }

    #[test]
    fn test_json_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json { .. }));
        assert!(err.as_api().is_none());
    }
}
