//! OAuth2 client credentials authentication
//!
//! Tokens are cached in memory and reused until they come within
//! [`TOKEN_EXPIRY_MARGIN_SECS`] of expiry. At most one token fetch is in
//! flight per instance: concurrent callers that find no valid token all
//! await the same shared fetch.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info};

use super::{truncate_body, AuthError, AuthHeaders, CONTENT_TYPE_JSON};

/// Tokens are not used within this many seconds of their expiry
pub const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

const MAX_EXPIRES_IN_SECS: i64 = 365 * 24 * 3600;

/// A cached access token
#[derive(Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Usable only while strictly before `expires_at` minus the margin
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at - chrono::Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS)
    }
}

impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token endpoint response body
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[allow(dead_code)]
    #[serde(default)]
    token_type: Option<String>,
    expires_in: i64,
    #[allow(dead_code)]
    #[serde(default)]
    scope: Option<String>,
}

type TokenFuture = Shared<BoxFuture<'static, Result<CachedToken, AuthError>>>;

struct InFlight {
    id: u64,
    future: TokenFuture,
}

#[derive(Default)]
struct TokenState {
    cached: Option<CachedToken>,
    in_flight: Option<InFlight>,
    next_id: u64,
}

/// Everything a token fetch needs, owned so the fetch can outlive any caller
struct TokenRequestParams {
    client_id: String,
    client_secret: SecretString,
    scope: String,
    token_url: String,
    http: reqwest::Client,
    timeout: Duration,
}

/// OAuth2 client credentials strategy
pub struct OAuth2Auth {
    params: Arc<TokenRequestParams>,
    state: Mutex<TokenState>,
}

impl OAuth2Auth {
    pub fn new(
        client_id: String,
        client_secret: SecretString,
        scope: String,
        token_url: String,
        http: reqwest::Client,
        timeout: Duration,
    ) -> Self {
        Self {
            params: Arc::new(TokenRequestParams {
                client_id,
                client_secret,
                scope,
                token_url,
                http,
                timeout,
            }),
            state: Mutex::new(TokenState::default()),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.params.client_id.is_empty() && !self.params.client_secret.expose_secret().is_empty()
    }

    /// Clear the cached token and forget any in-flight fetch
    pub fn invalidate_cache(&self) {
        let mut state = self.state.lock();
        state.cached = None;
        state.in_flight = None;
        debug!("OAuth2 token cache invalidated");
    }

    pub async fn headers(&self) -> Result<AuthHeaders, AuthError> {
        let token = self.get_valid_token().await?;
        let mut headers = AuthHeaders::new();
        headers.insert("Authorization", format!("Bearer {}", token));
        headers.insert("Content-Type", CONTENT_TYPE_JSON);
        Ok(headers)
    }

    /// Return a valid access token, fetching one if necessary
    pub async fn get_valid_token(&self) -> Result<String, AuthError> {
        if !self.is_configured() {
            return Err(AuthError::MissingCredential("client id and client secret are required"));
        }

        let (id, future) = {
            let mut state = self.state.lock();
            if let Some(token) = &state.cached {
                if token.is_valid_at(Utc::now()) {
                    return Ok(token.access_token.clone());
                }
            }

            let existing = state
                .in_flight
                .as_ref()
                .map(|in_flight| (in_flight.id, in_flight.future.clone()));
            match existing {
                Some(shared) => shared,
                None => {
                    state.next_id += 1;
                    let id = state.next_id;
                    let future = fetch_token(Arc::clone(&self.params)).boxed().shared();
                    state.in_flight = Some(InFlight {
                        id,
                        future: future.clone(),
                    });
                    (id, future)
                }
            }
        };

        let result = future.await;

        {
            let mut state = self.state.lock();
            // An invalidation while we waited replaced or cleared the marker;
            // the stale result is returned but not cached.
            if state.in_flight.as_ref().map(|f| f.id) == Some(id) {
                state.in_flight = None;
                if let Ok(token) = &result {
                    state.cached = Some(token.clone());
                }
            }
        }

        result.map(|token| token.access_token)
    }
}

async fn fetch_token(params: Arc<TokenRequestParams>) -> Result<CachedToken, AuthError> {
    debug!(token_url = %params.token_url, "Requesting OAuth2 access token");

    let form = [
        ("grant_type", "client_credentials"),
        ("client_id", params.client_id.as_str()),
        ("client_secret", params.client_secret.expose_secret()),
        ("scope", params.scope.as_str()),
    ];

    let response = params
        .http
        .post(&params.token_url)
        .timeout(params.timeout)
        .form(&form)
        .send()
        .await
        .map_err(|e| AuthError::TokenTransport(e.without_url().to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AuthError::TokenTransport(e.without_url().to_string()))?;

    if !status.is_success() {
        return Err(AuthError::TokenRequest {
            status: status.as_u16(),
            body: truncate_body(&body),
        });
    }

    let token: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| AuthError::InvalidTokenResponse(e.to_string()))?;

    let expires_in = token.expires_in.clamp(0, MAX_EXPIRES_IN_SECS);
    let expires_at = Utc::now() + chrono::Duration::seconds(expires_in);
    info!(expires_in = token.expires_in, "Obtained OAuth2 access token");

    Ok(CachedToken {
        access_token: token.access_token,
        expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token_body(token: &str, expires_in: i64) -> serde_json::Value {
        serde_json::json!({
            "access_token": token,
            "token_type": "Bearer",
            "expires_in": expires_in,
            "scope": "all"
        })
    }

    fn auth_for(server: &MockServer) -> OAuth2Auth {
        OAuth2Auth::new(
            "client-id".to_string(),
            SecretString::from("client-secret".to_string()),
            "all".to_string(),
            format!("{}/auth/oauth2/token", server.uri()),
            reqwest::Client::new(),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_token_validity_margin() {
        let now = Utc::now();
        let token = CachedToken {
            access_token: "t".to_string(),
            expires_at: now + chrono::Duration::seconds(61),
        };
        assert!(token.is_valid_at(now));

        let token = CachedToken {
            access_token: "t".to_string(),
            expires_at: now + chrono::Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS),
        };
        assert!(!token.is_valid_at(now));
    }

    #[test]
    fn test_cached_token_debug_is_redacted() {
        let token = CachedToken {
            access_token: "very-secret".to_string(),
            expires_at: Utc::now(),
        };
        assert!(!format!("{:?}", token).contains("very-secret"));
    }

    #[tokio::test]
    async fn test_token_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/oauth2/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=client-id"))
            .and(body_string_contains("scope=all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("tok-1", 3600)))
            .expect(1)
            .mount(&server)
            .await;

        let auth = auth_for(&server);
        let headers = auth.headers().await.unwrap();
        assert_eq!(headers.get("Authorization"), Some("Bearer tok-1"));
        assert_eq!(auth.get_valid_token().await.unwrap(), "tok-1");
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/oauth2/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(token_body("shared", 3600))
                    .set_delay(Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let auth = auth_for(&server);
        let (a, b) = tokio::join!(auth.headers(), auth.headers());
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.get("Authorization"), Some("Bearer shared"));
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("tok", 3600)))
            .expect(2)
            .mount(&server)
            .await;

        let auth = auth_for(&server);
        auth.get_valid_token().await.unwrap();
        auth.invalidate_cache();
        auth.get_valid_token().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalidate_during_fetch_discards_stale_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/oauth2/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(token_body("stale", 3600))
                    .set_delay(Duration::from_millis(300)),
            )
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/oauth2/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(token_body("fresh", 3600))
                    .set_delay(Duration::from_millis(300)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let auth = auth_for(&server);
        let (first, second) = tokio::join!(auth.get_valid_token(), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            auth.invalidate_cache();
            auth.get_valid_token().await
        });

        // The caller that started the stale fetch still gets its result
        assert_eq!(first.unwrap(), "stale");
        assert_eq!(second.unwrap(), "fresh");

        // Only the fetch started after invalidation was cached
        assert_eq!(auth.get_valid_token().await.unwrap(), "fresh");
    }

    #[tokio::test]
    async fn test_token_inside_margin_is_refetched() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("short", 30)))
            .expect(2)
            .mount(&server)
            .await;

        let auth = auth_for(&server);
        auth.get_valid_token().await.unwrap();
        auth.get_valid_token().await.unwrap();
    }

    #[tokio::test]
    async fn test_token_endpoint_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/oauth2/token"))
            .respond_with(
                ResponseTemplate::new(401).set_body_string(r#"{"error":"invalid_client"}"#),
            )
            .expect(2)
            .mount(&server)
            .await;

        let auth = auth_for(&server);
        let err = auth.get_valid_token().await.unwrap_err();
        match &err {
            AuthError::TokenRequest { status, body } => {
                assert_eq!(*status, 401);
                assert!(body.contains("invalid_client"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!err.to_string().contains("client-secret"));

        // A failed fetch is not cached; the next call tries again
        assert!(auth.get_valid_token().await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_token_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let auth = auth_for(&server);
        let err = auth.get_valid_token().await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidTokenResponse(_)));
    }

    #[tokio::test]
    async fn test_unconfigured_client() {
        let auth = OAuth2Auth::new(
            String::new(),
            SecretString::from(String::new()),
            "all".to_string(),
            "http://127.0.0.1:9/token".to_string(),
            reqwest::Client::new(),
            Duration::from_secs(1),
        );
        assert!(!auth.is_configured());
        assert!(matches!(
            auth.get_valid_token().await,
            Err(AuthError::MissingCredential(_))
        ));
    }
}
