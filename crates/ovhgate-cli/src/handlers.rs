//! Command handlers for CLI subcommands
//!
//! This module contains the implementation logic for each CLI subcommand.

mod call;
mod completions;
mod request;
pub mod serve;
mod tools;

pub use call::handle_call;
pub use completions::handle_completions;
pub use request::handle_request;
pub use serve::handle_serve;
pub use tools::handle_tools;

use crate::config::Config;
use crate::error::{Error, Result};
use ovhgate_core::{GatewayConfig, OvhClient, ToolDispatcher, TracingAuditSink};
use serde_json::Value;
use std::sync::Arc;

/// Build the gateway configuration and warn when credentials are missing
pub(crate) fn gateway(config: &Config) -> Result<GatewayConfig> {
    let gateway = config.gateway_config()?;
    tracing::info!(
        base_url = %gateway.base_url,
        auth_method = ?gateway.auth.method(),
        timeout_ms = gateway.request_timeout.as_millis() as u64,
        max_retries = gateway.max_retries,
        "Gateway configured"
    );
    if !gateway.has_credentials() {
        tracing::warn!("No credentials configured; API calls will be rejected");
    }
    Ok(gateway)
}

/// Client and dispatcher wired with the audit log
pub(crate) fn build_dispatcher(config: &Config) -> Result<ToolDispatcher> {
    let gateway = gateway(config)?;
    let client = OvhClient::new(&gateway)?;
    Ok(ToolDispatcher::new(client, Arc::new(TracingAuditSink)))
}

/// Parse an optional JSON command-line argument
pub(crate) fn parse_json_arg(name: &str, raw: Option<&str>) -> Result<Value> {
    match raw {
        None => Ok(Value::Null),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| Error::invalid_args(format!("--{} is not valid JSON: {}", name, e))),
    }
}
