//! ovhgate core - request pipeline and tool catalog for the OVHcloud API
//!
//! # Main Components
//!
//! - **Configuration**: endpoint, credential and retry settings from the environment
//! - **HTTP pipeline**: credential strategies, timeout-bounded execution, retries
//!   and a normalized error taxonomy
//! - **Tools**: a fixed catalog of web hosting and domain operations with input
//!   validation, dispatch and auditing
//!
//! # Example
//!
//! ```no_run
//! use ovhgate_core::{GatewayConfig, OvhClient, RequestOptions};
//!
//! async fn example() -> ovhgate_core::Result<()> {
//!     let config = GatewayConfig::from_env()?;
//!     let client = OvhClient::new(&config)?;
//!     let services = client
//!         .get::<Vec<String>>("/hosting/web", RequestOptions::new())
//!         .await?;
//!     println!("{:?}", services.data);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod tools;

pub use config::{AuthConfig, AuthMethod, Endpoint, GatewayConfig};
pub use error::{Error, Result};
pub use http::{
    ApiResponse, BearerPassthrough, Credentials, ErrorKind, OvhApiError, OvhClient, RequestOptions,
    RetryPolicy,
};
pub use tools::{
    AuditRecord, AuditSink, ToolDefinition, ToolDispatcher, ToolError, ToolErrorCode, ToolOutput,
    TracingAuditSink,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
