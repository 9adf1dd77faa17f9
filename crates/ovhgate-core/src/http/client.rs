//! Client facade for the OVHcloud API
//!
//! Provides verb-shaped entry points that build the target URL, serialize
//! the body and run the request through the retry controller.

use std::sync::Arc;

use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::GatewayConfig;
use crate::error::{Error, Result as CrateResult};
use crate::http::auth::{Credentials, SharedCredentials};
use crate::http::error::OvhApiError;
use crate::http::executor::RequestExecutor;
use crate::http::retry::{execute_with_retry, RetryPolicy};

/// A successful response
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub data: T,
    pub status: u16,
    pub headers: HeaderMap,
}

impl<T> ApiResponse<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            data: f(self.data),
            status: self.status,
            headers: self.headers,
        }
    }
}

/// Per-call options
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Query parameters; `None` values are omitted from the URL
    pub query: Vec<(String, Option<String>)>,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
    /// Make exactly one attempt
    pub skip_retry: bool,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), Some(value.into())));
        self
    }

    pub fn query_opt(mut self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        self.query.push((key.into(), value.map(Into::into)));
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize any value as the JSON body
    pub fn json<B: Serialize>(mut self, body: &B) -> CrateResult<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn skip_retry(mut self, skip: bool) -> Self {
        self.skip_retry = skip;
        self
    }
}

/// OVHcloud API client
#[derive(Debug, Clone)]
pub struct OvhClient {
    base_url: String,
    executor: RequestExecutor,
    retry_policy: RetryPolicy,
}

impl OvhClient {
    /// Build the client and its credential strategy from configuration
    pub fn new(config: &GatewayConfig) -> CrateResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("ovhgate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::HttpClient {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(Box::new(e)),
            })?;

        let credentials = Arc::new(Credentials::from_config(config, http.clone()));
        debug!(
            base_url = %config.base_url,
            auth = credentials.method_name(),
            "Created API client"
        );

        Ok(Self::with_parts(
            config.base_url.clone(),
            RequestExecutor::new(http, credentials, config.request_timeout),
            config.retry_policy(),
        ))
    }

    pub fn with_parts(base_url: String, executor: RequestExecutor, retry_policy: RetryPolicy) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            executor,
            retry_policy,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &SharedCredentials {
        self.executor.credentials()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>, OvhApiError> {
        self.request(Method::GET, path, options).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>, OvhApiError> {
        self.request(Method::POST, path, options).await
    }

    pub async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>, OvhApiError> {
        self.request(Method::PUT, path, options).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>, OvhApiError> {
        self.request(Method::DELETE, path, options).await
    }

    /// Run a request with retries and decode the body into `T`
    #[instrument(skip(self, options), fields(skip_retry = options.skip_retry))]
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>, OvhApiError> {
        let url = self.build_url(path, &options.query)?;
        let body = options
            .body
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| OvhApiError::validation(format!("Request body is not serializable: {}", e)))?;

        let response = execute_with_retry(
            |_attempt| {
                self.executor
                    .execute(&method, &url, body.as_deref(), &options.headers)
            },
            &self.retry_policy,
            options.skip_retry,
        )
        .await?;

        let status = response.status;
        let data = serde_json::from_value(response.data).map_err(|e| OvhApiError::decode(status, e))?;
        Ok(ApiResponse {
            data,
            status,
            headers: response.headers,
        })
    }

    /// Join base URL and path, then append encoded query parameters
    pub fn build_url(&self, path: &str, query: &[(String, Option<String>)]) -> Result<String, OvhApiError> {
        let mut url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        url::Url::parse(&url).map_err(|e| OvhApiError::validation(format!("Invalid request URL: {}", e)))?;

        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        let mut has_params = false;
        for (key, value) in query {
            if let Some(value) = value {
                serializer.append_pair(key, value);
                has_params = true;
            }
        }
        if has_params {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&serializer.finish());
        }
        Ok(url)
    }
}
