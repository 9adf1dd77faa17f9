//! Single-attempt request execution
//!
//! One call to [`RequestExecutor::execute`] is one transport attempt:
//! credential headers are produced, merged with caller headers, and the
//! round trip (send plus body read) runs under the request timeout.

use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, trace};

use crate::http::auth::{AuthHeaders, SharedCredentials};
use crate::http::client::ApiResponse;
use crate::http::error::OvhApiError;

/// Performs exactly one HTTP attempt and normalizes its failures
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    http: reqwest::Client,
    credentials: SharedCredentials,
    timeout: Duration,
}

impl RequestExecutor {
    pub fn new(http: reqwest::Client, credentials: SharedCredentials, timeout: Duration) -> Self {
        Self {
            http,
            credentials,
            timeout,
        }
    }

    pub fn credentials(&self) -> &SharedCredentials {
        &self.credentials
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute one attempt
    ///
    /// `extra_headers` override credential headers with the same name.
    pub async fn execute(
        &self,
        method: &Method,
        url: &str,
        body: Option<&str>,
        extra_headers: &[(String, String)],
    ) -> Result<ApiResponse<Value>, OvhApiError> {
        let mut headers = self
            .credentials
            .headers(method, url, body)
            .await
            .map_err(OvhApiError::authentication)?;

        for (name, value) in extra_headers {
            headers.insert(name.clone(), value.clone());
        }
        let header_map = to_header_map(&headers)?;

        let mut request = self.http.request(method.clone(), url).headers(header_map);
        if let Some(body) = body {
            request = request.body(body.to_owned());
        }

        let started = Instant::now();
        // Dropping the round-trip future on timeout aborts the transport call
        let round_trip = async {
            let response = request.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.text().await;
            Ok::<_, reqwest::Error>((status, headers, body))
        };

        let (status, response_headers, body) = match tokio::time::timeout(self.timeout, round_trip).await {
            Ok(Ok(parts)) => parts,
            Ok(Err(e)) => return Err(self.transport_error(e)),
            Err(_) => return Err(OvhApiError::timeout(self.timeout)),
        };

        let text = match body {
            Ok(text) => text,
            // The status line arrived, so it decides the classification
            Err(e) if !status.is_success() => {
                debug!(status = status.as_u16(), error = %e.without_url(), "Error response body unreadable");
                String::new()
            }
            Err(e) => return Err(self.transport_error(e)),
        };

        debug!(
            method = %method,
            url = %url,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request completed"
        );

        if !status.is_success() {
            return Err(OvhApiError::from_response(status, &text));
        }

        let data = parse_body(status.as_u16(), &text)?;
        trace!(bytes = text.len(), "Response body decoded");

        Ok(ApiResponse {
            data,
            status: status.as_u16(),
            headers: response_headers,
        })
    }

    /// Failure before a complete response was available
    fn transport_error(&self, error: reqwest::Error) -> OvhApiError {
        if error.is_timeout() {
            OvhApiError::timeout(self.timeout)
        } else if error.is_builder() {
            OvhApiError::validation(format!("Invalid request: {}", error.without_url()))
        } else {
            OvhApiError::network(error)
        }
    }
}

/// Empty bodies decode as `null`
fn parse_body(status: u16, text: &str) -> Result<Value, OvhApiError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| OvhApiError::decode(status, e))
}

fn to_header_map(headers: &AuthHeaders) -> Result<HeaderMap, OvhApiError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| OvhApiError::validation(format!("Invalid header name '{}'", name)))?;
        // Values may be credentials, so they stay out of the message
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| OvhApiError::validation(format!("Invalid value for header '{}'", name)))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}
