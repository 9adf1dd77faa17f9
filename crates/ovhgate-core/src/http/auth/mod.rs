//! Authentication handling for the OVHcloud API
//!
//! Supports three mutually incompatible schemes, selected once at startup:
//! - Signed requests (application key/secret + consumer key, SHA-1 signature)
//! - OAuth2 client credentials with an in-memory cached token
//! - Bearer passthrough, reading a token bound to the current call

use std::fmt;
use std::sync::Arc;

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};

use crate::config::{AuthConfig, GatewayConfig};

pub mod bearer;
pub mod oauth2;
pub mod signed;

pub use bearer::BearerPassthrough;
pub use oauth2::{CachedToken, OAuth2Auth, TOKEN_EXPIRY_MARGIN_SECS};
pub use signed::{sign, SignedRequestAuth};

/// Authentication errors
///
/// `Clone` so that one token refresh outcome can be handed to every
/// concurrent waiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("token endpoint returned HTTP {status}: {body}")]
    TokenRequest { status: u16, body: String },

    #[error("token endpoint request failed: {0}")]
    TokenTransport(String),

    #[error("invalid token response: {0}")]
    InvalidTokenResponse(String),

    #[error("no bearer token was supplied for this call")]
    NoBearerToken,
}

/// Ordered header name/value pairs produced fresh for a single request
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthHeaders(Vec<(String, String)>);

impl AuthHeaders {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Insert a header, replacing an existing one with the same name
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(&name)) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Values carry signatures and tokens, so only names are printed.
impl fmt::Debug for AuthHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter().map(|(n, _)| n)).finish()
    }
}

/// The credential strategy in use for this process
pub enum Credentials {
    Signed(SignedRequestAuth),
    OAuth2(OAuth2Auth),
    Bearer(BearerPassthrough),
}

impl Credentials {
    /// Build the strategy selected by the configuration
    ///
    /// `http` is used for the strategy's own network calls (time sync,
    /// token fetch), each bounded by the configured request timeout.
    pub fn from_config(config: &GatewayConfig, http: reqwest::Client) -> Self {
        let timeout = config.request_timeout;
        match &config.auth {
            AuthConfig::Signed {
                application_key,
                application_secret,
                consumer_key,
            } => Credentials::Signed(SignedRequestAuth::new(
                application_key.clone(),
                copy_secret(application_secret),
                copy_secret(consumer_key),
                format!("{}/auth/time", config.base_url.trim_end_matches('/')),
                http,
                timeout,
            )),
            AuthConfig::OAuth2 {
                client_id,
                client_secret,
                scope,
                token_url,
            } => Credentials::OAuth2(OAuth2Auth::new(
                client_id.clone(),
                copy_secret(client_secret),
                scope.clone(),
                token_url.clone(),
                http,
                timeout,
            )),
            AuthConfig::Bearer => Credentials::Bearer(BearerPassthrough),
        }
    }

    /// Produce authentication headers for one request
    pub async fn headers(
        &self,
        method: &Method,
        url: &str,
        body: Option<&str>,
    ) -> Result<AuthHeaders, AuthError> {
        match self {
            Credentials::Signed(auth) => auth.headers(method, url, body).await,
            Credentials::OAuth2(auth) => auth.headers().await,
            Credentials::Bearer(auth) => auth.headers(),
        }
    }

    /// Whether the secrets this strategy needs are present
    pub fn is_configured(&self) -> bool {
        match self {
            Credentials::Signed(auth) => auth.is_configured(),
            Credentials::OAuth2(auth) => auth.is_configured(),
            Credentials::Bearer(_) => true,
        }
    }

    /// Drop any cached token or clock offset
    pub fn invalidate_cache(&self) {
        match self {
            Credentials::Signed(auth) => auth.invalidate_cache(),
            Credentials::OAuth2(auth) => auth.invalidate_cache(),
            Credentials::Bearer(_) => {}
        }
    }

    pub fn method_name(&self) -> &'static str {
        match self {
            Credentials::Signed(_) => "signed",
            Credentials::OAuth2(_) => "oauth2",
            Credentials::Bearer(_) => "bearer",
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("method", &self.method_name())
            .field("configured", &self.is_configured())
            .finish()
    }
}

/// Shared handle used by the executor
pub type SharedCredentials = Arc<Credentials>;

fn copy_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_owned())
}

pub(crate) const CONTENT_TYPE_JSON: &str = "application/json";

/// Truncate remote error bodies before they end up in messages
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 512;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
