//! Outbound request pipeline for the OVHcloud API
//!
//! This module provides:
//! - Error classification and normalization
//! - Credential strategies (signed requests, OAuth2, bearer passthrough)
//! - Single-attempt execution under a timeout
//! - Retry logic with backoff and jitter
//! - A verb-shaped client facade

pub mod auth;
pub mod client;
pub mod error;
pub mod executor;
pub mod retry;

pub use auth::{AuthError, AuthHeaders, BearerPassthrough, Credentials, SharedCredentials};
pub use client::{ApiResponse, OvhClient, RequestOptions};
pub use error::{ErrorKind, OvhApiError};
pub use executor::RequestExecutor;
pub use retry::{execute_with_retry, RetryDecision, RetryPolicy};

// Re-export commonly used types
pub use reqwest::{Method, StatusCode};
