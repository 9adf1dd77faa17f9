//! Signed request authentication (application key + consumer key)
//!
//! Each request carries a `$1$`-prefixed SHA-1 signature over the secret,
//! consumer key, method, full URL, body and a timestamp corrected by the
//! offset between the remote clock and ours.

use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use sha1::{Digest, Sha1};
use tracing::{debug, warn};

use super::{AuthError, AuthHeaders, CONTENT_TYPE_JSON};

pub const HEADER_APPLICATION: &str = "X-Ovh-Application";
pub const HEADER_CONSUMER: &str = "X-Ovh-Consumer";
pub const HEADER_TIMESTAMP: &str = "X-Ovh-Timestamp";
pub const HEADER_SIGNATURE: &str = "X-Ovh-Signature";

/// Compute the request signature
///
/// `"$1$" + sha1_hex(secret + "+" + consumer_key + "+" + METHOD + "+" + url + "+" + body + "+" + timestamp)`
pub fn sign(
    application_secret: &str,
    consumer_key: &str,
    method: &str,
    url: &str,
    body: &str,
    timestamp: i64,
) -> String {
    let payload = format!(
        "{}+{}+{}+{}+{}+{}",
        application_secret,
        consumer_key,
        method.to_uppercase(),
        url,
        body,
        timestamp
    );
    let digest = Sha1::digest(payload.as_bytes());
    format!("$1${}", hex::encode(digest))
}

/// Signed request credential strategy
pub struct SignedRequestAuth {
    application_key: String,
    application_secret: SecretString,
    consumer_key: SecretString,
    time_url: String,
    http: reqwest::Client,
    timeout: Duration,
    /// Remote clock minus local clock, in seconds; `None` until synced
    time_delta: Mutex<Option<i64>>,
    /// Serializes time syncs so concurrent first requests share one call
    sync_lock: tokio::sync::Mutex<()>,
}

impl SignedRequestAuth {
    pub fn new(
        application_key: String,
        application_secret: SecretString,
        consumer_key: SecretString,
        time_url: String,
        http: reqwest::Client,
        timeout: Duration,
    ) -> Self {
        Self {
            application_key,
            application_secret,
            consumer_key,
            time_url,
            http,
            timeout,
            time_delta: Mutex::new(None),
            sync_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.application_key.is_empty()
            && !self.application_secret.expose_secret().is_empty()
            && !self.consumer_key.expose_secret().is_empty()
    }

    /// Forget the clock offset; the next request resynchronizes
    pub fn invalidate_cache(&self) {
        *self.time_delta.lock() = None;
    }

    /// The current clock offset, if one has been established
    pub fn time_delta(&self) -> Option<i64> {
        *self.time_delta.lock()
    }

    pub async fn headers(
        &self,
        method: &Method,
        url: &str,
        body: Option<&str>,
    ) -> Result<AuthHeaders, AuthError> {
        if !self.is_configured() {
            return Err(AuthError::MissingCredential(
                "application key, application secret and consumer key are required",
            ));
        }

        let delta = self.synced_delta().await;
        let timestamp = Utc::now().timestamp() + delta;
        let signature = sign(
            self.application_secret.expose_secret(),
            self.consumer_key.expose_secret(),
            method.as_str(),
            url,
            body.unwrap_or(""),
            timestamp,
        );

        let mut headers = AuthHeaders::new();
        headers.insert(HEADER_APPLICATION, self.application_key.clone());
        headers.insert(HEADER_CONSUMER, self.consumer_key.expose_secret().to_owned());
        headers.insert(HEADER_TIMESTAMP, timestamp.to_string());
        headers.insert(HEADER_SIGNATURE, signature);
        headers.insert("Content-Type", CONTENT_TYPE_JSON);
        Ok(headers)
    }

    /// Return the cached offset, syncing with the remote clock first if needed
    ///
    /// A failed sync yields an offset of zero and never fails the request.
    async fn synced_delta(&self) -> i64 {
        if let Some(delta) = self.time_delta() {
            return delta;
        }

        let _guard = self.sync_lock.lock().await;
        if let Some(delta) = self.time_delta() {
            return delta;
        }

        let delta = match self.fetch_remote_time().await {
            Ok(remote) => {
                let delta = remote - Utc::now().timestamp();
                debug!(delta_secs = delta, "Synchronized with remote clock");
                delta
            }
            Err(e) => {
                warn!(error = %e, "Time synchronization failed, signing with local clock");
                0
            }
        };
        *self.time_delta.lock() = Some(delta);
        delta
    }

    async fn fetch_remote_time(&self) -> Result<i64, String> {
        let response = self
            .http
            .get(&self.time_url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| e.without_url().to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("time endpoint returned HTTP {}", status.as_u16()));
        }

        let text = response.text().await.map_err(|e| e.without_url().to_string())?;
        serde_json::from_str::<i64>(text.trim()).map_err(|e| format!("invalid time response: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sha1_hex(input: &str) -> String {
        hex::encode(Sha1::digest(input.as_bytes()))
    }

    fn auth_for(server_uri: &str) -> SignedRequestAuth {
        SignedRequestAuth::new(
            "app-key".to_string(),
            SecretString::from("S".to_string()),
            SecretString::from("CK".to_string()),
            format!("{}/auth/time", server_uri),
            reqwest::Client::new(),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_signature_format() {
        let signature = sign("S", "CK", "GET", "https://x/y", "", 1_700_000_000);
        assert_eq!(
            signature,
            format!("$1${}", sha1_hex("S+CK+GET+https://x/y++1700000000"))
        );
    }

    #[test]
    fn test_signature_uppercases_method_and_includes_body() {
        let lower = sign("S", "CK", "post", "https://x/y", r#"{"a":1}"#, 42);
        let upper = sign("S", "CK", "POST", "https://x/y", r#"{"a":1}"#, 42);
        assert_eq!(lower, upper);
        assert_eq!(
            upper,
            format!("$1${}", sha1_hex(r#"S+CK+POST+https://x/y+{"a":1}+42"#))
        );
    }

    #[tokio::test]
    async fn test_time_sync_sets_delta_once() {
        let server = MockServer::start().await;
        let remote = Utc::now().timestamp() + 120;
        Mock::given(method("GET"))
            .and(path("/auth/time"))
            .respond_with(ResponseTemplate::new(200).set_body_string(remote.to_string()))
            .expect(1)
            .mount(&server)
            .await;

        let auth = auth_for(&server.uri());
        let url = "https://eu.api.ovh.com/1.0/me";
        let headers = auth.headers(&Method::GET, url, None).await.unwrap();
        auth.headers(&Method::GET, url, None).await.unwrap();

        let delta = auth.time_delta().unwrap();
        assert!((119..=121).contains(&delta), "unexpected delta {}", delta);

        let timestamp: i64 = headers.get(HEADER_TIMESTAMP).unwrap().parse().unwrap();
        let expected = sign("S", "CK", "GET", url, "", timestamp);
        assert_eq!(headers.get(HEADER_SIGNATURE), Some(expected.as_str()));
        assert_eq!(headers.get(HEADER_APPLICATION), Some("app-key"));
        assert_eq!(headers.get(HEADER_CONSUMER), Some("CK"));
        assert_eq!(headers.get("Content-Type"), Some(CONTENT_TYPE_JSON));
    }

    #[tokio::test]
    async fn test_failed_time_sync_uses_zero_delta() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/time"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let auth = auth_for(&server.uri());
        let before = Utc::now().timestamp();
        let headers = auth
            .headers(&Method::GET, "https://x/y", None)
            .await
            .expect("sync failure must not fail the request");

        assert_eq!(auth.time_delta(), Some(0));
        let timestamp: i64 = headers.get(HEADER_TIMESTAMP).unwrap().parse().unwrap();
        assert!(timestamp >= before && timestamp <= Utc::now().timestamp());
        let signature = headers.get(HEADER_SIGNATURE).unwrap();
        assert!(signature.starts_with("$1$"));
        assert_eq!(signature.len(), 3 + 40);
    }

    #[tokio::test]
    async fn test_unreachable_time_endpoint_does_not_fail() {
        // Bind then release a port so nothing listens on it
        let uri = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            format!("http://{}", listener.local_addr().unwrap())
        };
        let auth = auth_for(&uri);
        assert!(auth.headers(&Method::GET, "https://x/y", None).await.is_ok());
        assert_eq!(auth.time_delta(), Some(0));
    }

    #[tokio::test]
    async fn test_invalidate_forces_resync() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/time"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(Utc::now().timestamp().to_string()),
            )
            .expect(2)
            .mount(&server)
            .await;

        let auth = auth_for(&server.uri());
        auth.headers(&Method::GET, "https://x/y", None).await.unwrap();
        auth.invalidate_cache();
        assert_eq!(auth.time_delta(), None);
        auth.headers(&Method::GET, "https://x/y", None).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_secret_is_an_auth_error() {
        let auth = SignedRequestAuth::new(
            "app-key".to_string(),
            SecretString::from(String::new()),
            SecretString::from("CK".to_string()),
            "http://127.0.0.1:9/auth/time".to_string(),
            reqwest::Client::new(),
            Duration::from_secs(1),
        );
        let err = auth.headers(&Method::GET, "https://x/y", None).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingCredential(_)));
    }
}
