//! Bearer passthrough authentication
//!
//! The token belongs to the inbound call, not to the process. The transport
//! binds it with [`BearerPassthrough::scope`] for the duration of one call;
//! code running inside that future sees it, nothing else does. The binding
//! is task-local, so work handed to `tokio::spawn` does not inherit it.

use std::future::Future;

use super::{AuthError, AuthHeaders, CONTENT_TYPE_JSON};

tokio::task_local! {
    static BEARER_TOKEN: String;
}

/// Bearer passthrough strategy (stateless)
#[derive(Debug, Clone, Copy, Default)]
pub struct BearerPassthrough;

impl BearerPassthrough {
    /// Run `work` with `token` bound for its whole duration
    ///
    /// The binding is removed when `work` completes, whether it succeeds,
    /// fails or is dropped.
    pub async fn scope<F>(token: impl Into<String>, work: F) -> F::Output
    where
        F: Future,
    {
        BEARER_TOKEN.scope(token.into(), work).await
    }

    /// The token bound to the current call, if any
    pub fn current_token() -> Option<String> {
        BEARER_TOKEN
            .try_with(|token| token.clone())
            .ok()
            .filter(|token| !token.is_empty())
    }

    pub fn headers(&self) -> Result<AuthHeaders, AuthError> {
        let token = Self::current_token().ok_or(AuthError::NoBearerToken)?;
        let mut headers = AuthHeaders::new();
        headers.insert("Authorization", format!("Bearer {}", token));
        headers.insert("Content-Type", CONTENT_TYPE_JSON);
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_headers_outside_scope_fail() {
        let err = BearerPassthrough.headers().unwrap_err();
        assert!(matches!(err, AuthError::NoBearerToken));
    }

    #[tokio::test]
    async fn test_headers_inside_scope() {
        let headers = BearerPassthrough::scope("abc.def", async { BearerPassthrough.headers() })
            .await
            .unwrap();
        assert_eq!(headers.get("Authorization"), Some("Bearer abc.def"));
        assert_eq!(headers.get("Content-Type"), Some(CONTENT_TYPE_JSON));

        // Unbound again once the scope is left
        assert!(BearerPassthrough::current_token().is_none());
    }

    #[tokio::test]
    async fn test_empty_token_counts_as_missing() {
        let result = BearerPassthrough::scope("", async { BearerPassthrough.headers() }).await;
        assert!(matches!(result, Err(AuthError::NoBearerToken)));
    }

    #[tokio::test]
    async fn test_scope_unbinds_after_failure() {
        let result: Result<(), &str> =
            BearerPassthrough::scope("tok", async { Err("tool failed") }).await;
        assert!(result.is_err());
        assert!(BearerPassthrough::current_token().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_scopes_are_isolated() {
        let first = BearerPassthrough::scope("token-one", async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            BearerPassthrough::current_token()
        });
        let second = BearerPassthrough::scope("token-two", async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            BearerPassthrough::current_token()
        });

        let (first, second) = tokio::join!(first, second);
        assert_eq!(first.as_deref(), Some("token-one"));
        assert_eq!(second.as_deref(), Some("token-two"));
    }
}
