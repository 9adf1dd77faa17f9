//! Gateway configuration
//!
//! Settings are read once at startup, either from the process environment
//! (after loading a `.env` file if one exists) or from any key lookup the
//! caller supplies. The result is immutable for the life of the process.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::error::{Error, Result};
use crate::http::retry::{RetryPolicy, DEFAULT_BACKOFF_SECS, DEFAULT_MAX_RETRIES};

/// Default per-attempt request timeout
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default OAuth2 scope
pub const DEFAULT_OAUTH2_SCOPE: &str = "all";

pub const ENV_ENDPOINT: &str = "OVH_ENDPOINT";
pub const ENV_BASE_URL: &str = "OVH_BASE_URL";
pub const ENV_TOKEN_URL: &str = "OVH_TOKEN_URL";
pub const ENV_AUTH_METHOD: &str = "OVH_AUTH_METHOD";
pub const ENV_APPLICATION_KEY: &str = "OVH_APPLICATION_KEY";
pub const ENV_APPLICATION_SECRET: &str = "OVH_APPLICATION_SECRET";
pub const ENV_CONSUMER_KEY: &str = "OVH_CONSUMER_KEY";
pub const ENV_CLIENT_ID: &str = "OVH_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "OVH_CLIENT_SECRET";
pub const ENV_OAUTH2_SCOPE: &str = "OVH_OAUTH2_SCOPE";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "OVH_REQUEST_TIMEOUT_MS";
pub const ENV_MAX_RETRIES: &str = "OVH_MAX_RETRIES";

/// Regional API endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endpoint {
    #[default]
    OvhEu,
    OvhCa,
    OvhUs,
}

impl Endpoint {
    pub fn base_url(&self) -> &'static str {
        match self {
            Endpoint::OvhEu => "https://eu.api.ovh.com/1.0",
            Endpoint::OvhCa => "https://ca.api.ovh.com/1.0",
            Endpoint::OvhUs => "https://api.us.ovhcloud.com/1.0",
        }
    }

    pub fn token_url(&self) -> &'static str {
        match self {
            Endpoint::OvhEu => "https://www.ovh.com/auth/oauth2/token",
            Endpoint::OvhCa => "https://ca.ovh.com/auth/oauth2/token",
            Endpoint::OvhUs => "https://us.ovhcloud.com/auth/oauth2/token",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::OvhEu => "ovh-eu",
            Endpoint::OvhCa => "ovh-ca",
            Endpoint::OvhUs => "ovh-us",
        }
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ovh-eu" | "eu" => Ok(Endpoint::OvhEu),
            "ovh-ca" | "ca" => Ok(Endpoint::OvhCa),
            "ovh-us" | "us" => Ok(Endpoint::OvhUs),
            other => Err(Error::config(format!(
                "unknown endpoint '{}' (expected ovh-eu, ovh-ca or ovh-us)",
                other
            ))),
        }
    }
}

/// Which credential strategy to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Signed,
    OAuth2,
    Bearer,
}

impl FromStr for AuthMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "signed" | "aksk" => Ok(AuthMethod::Signed),
            "oauth2" => Ok(AuthMethod::OAuth2),
            "bearer" => Ok(AuthMethod::Bearer),
            other => Err(Error::config(format!(
                "unknown auth method '{}' (expected signed, oauth2 or bearer)",
                other
            ))),
        }
    }
}

/// Credential settings for the selected strategy
#[derive(Debug)]
pub enum AuthConfig {
    Signed {
        application_key: String,
        application_secret: SecretString,
        consumer_key: SecretString,
    },
    OAuth2 {
        client_id: String,
        client_secret: SecretString,
        scope: String,
        token_url: String,
    },
    Bearer,
}

impl AuthConfig {
    pub fn method(&self) -> AuthMethod {
        match self {
            AuthConfig::Signed { .. } => AuthMethod::Signed,
            AuthConfig::OAuth2 { .. } => AuthMethod::OAuth2,
            AuthConfig::Bearer => AuthMethod::Bearer,
        }
    }
}

/// Immutable settings for the request pipeline
pub struct GatewayConfig {
    /// API root, without trailing slash
    pub base_url: String,
    pub auth: AuthConfig,
    /// Bound on each transport attempt
    pub request_timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Backoff schedule; the last entry repeats
    pub backoff: Vec<Duration>,
}

impl GatewayConfig {
    /// Create a configuration with default timeout and retry settings
    pub fn new(base_url: impl Into<String>, auth: AuthConfig) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
            request_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_BACKOFF_SECS.iter().map(|s| Duration::from_secs(*s)).collect(),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, backoff: Vec<Duration>) -> Self {
        self.backoff = backoff;
        self
    }

    /// Load from the process environment, reading `.env` first if present
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenv::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded environment file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    ///
    /// Empty values count as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let endpoint = match get(ENV_ENDPOINT) {
            Some(name) => name.parse()?,
            None => Endpoint::default(),
        };
        let base_url = get(ENV_BASE_URL).unwrap_or_else(|| endpoint.base_url().to_string());
        url::Url::parse(&base_url)
            .map_err(|e| Error::config_with_source(format!("invalid {}", ENV_BASE_URL), e))?;

        let method = match get(ENV_AUTH_METHOD) {
            Some(name) => name.parse()?,
            None => infer_method(&get),
        };

        let auth = match method {
            AuthMethod::Signed => AuthConfig::Signed {
                application_key: require(&get, ENV_APPLICATION_KEY)?,
                application_secret: SecretString::from(require(&get, ENV_APPLICATION_SECRET)?),
                consumer_key: SecretString::from(require(&get, ENV_CONSUMER_KEY)?),
            },
            AuthMethod::OAuth2 => AuthConfig::OAuth2 {
                client_id: require(&get, ENV_CLIENT_ID)?,
                client_secret: SecretString::from(require(&get, ENV_CLIENT_SECRET)?),
                scope: get(ENV_OAUTH2_SCOPE).unwrap_or_else(|| DEFAULT_OAUTH2_SCOPE.to_string()),
                token_url: get(ENV_TOKEN_URL).unwrap_or_else(|| endpoint.token_url().to_string()),
            },
            AuthMethod::Bearer => AuthConfig::Bearer,
        };

        let mut config = Self::new(base_url, auth);
        if let Some(ms) = get(ENV_REQUEST_TIMEOUT_MS) {
            let ms: u64 = parse_number(ENV_REQUEST_TIMEOUT_MS, &ms)?;
            if ms == 0 {
                return Err(Error::config(format!("{} must be greater than zero", ENV_REQUEST_TIMEOUT_MS)));
            }
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = get(ENV_MAX_RETRIES) {
            config.max_retries = parse_number(ENV_MAX_RETRIES, &retries)?;
        }

        Ok(config)
    }

    /// Retry policy derived from these settings
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries).with_delays(self.backoff.clone())
    }

    /// Whether the selected strategy has every secret it needs
    pub fn has_credentials(&self) -> bool {
        match &self.auth {
            AuthConfig::Signed {
                application_key,
                application_secret,
                consumer_key,
            } => {
                !application_key.is_empty()
                    && !application_secret.expose_secret().is_empty()
                    && !consumer_key.expose_secret().is_empty()
            }
            AuthConfig::OAuth2 {
                client_id,
                client_secret,
                ..
            } => !client_id.is_empty() && !client_secret.expose_secret().is_empty(),
            AuthConfig::Bearer => true,
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("auth", &self.auth.method())
            .field("request_timeout", &self.request_timeout)
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .finish()
    }
}

fn infer_method(get: &impl Fn(&str) -> Option<String>) -> AuthMethod {
    let has = |key: &str| get(key).is_some();
    if has(ENV_APPLICATION_KEY) && has(ENV_APPLICATION_SECRET) && has(ENV_CONSUMER_KEY) {
        AuthMethod::Signed
    } else if has(ENV_CLIENT_ID) && has(ENV_CLIENT_SECRET) {
        AuthMethod::OAuth2
    } else {
        AuthMethod::Bearer
    }
}

fn require(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    get(key).ok_or_else(|| Error::config(format!("{} is required for the selected auth method", key)))
}

fn parse_number<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .map_err(|e| Error::config_with_source(format!("{} must be a non-negative integer", key), e))
}
