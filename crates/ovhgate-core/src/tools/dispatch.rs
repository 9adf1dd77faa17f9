//! Tool dispatch
//!
//! Resolves a tool by name, validates its arguments, runs the request
//! through the client and audits the outcome.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::http::auth::BearerPassthrough;
use crate::http::client::{OvhClient, RequestOptions};
use crate::tools::audit::{AuditOutcome, AuditRecord, AuditSink};
use crate::tools::catalog::{self, ToolDefinition};
use crate::tools::validation::prepare_call;
use crate::tools::{ToolError, ToolOutput};

/// Maps tool calls onto API requests
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    client: OvhClient,
    audit: Arc<dyn AuditSink>,
}

impl ToolDispatcher {
    pub fn new(client: OvhClient, audit: Arc<dyn AuditSink>) -> Self {
        Self { client, audit }
    }

    pub fn tools(&self) -> &'static [ToolDefinition] {
        catalog::catalog()
    }

    pub fn client(&self) -> &OvhClient {
        &self.client
    }

    /// Run one tool call and audit it
    #[instrument(skip(self, arguments))]
    pub async fn call(&self, name: &str, arguments: &Value) -> Result<ToolOutput, ToolError> {
        let started = Instant::now();
        let result = self.run(name, arguments).await;

        let (outcome, code, kind, http_status) = match &result {
            Ok(output) => (AuditOutcome::Success, None, None, Some(output.status)),
            Err(err) => (
                AuditOutcome::Failure,
                Some(err.code.as_str()),
                err.kind.map(|k| k.as_str()),
                err.http_status,
            ),
        };
        self.audit.record(AuditRecord {
            tool: name.to_string(),
            outcome,
            code,
            kind,
            http_status,
            duration: started.elapsed(),
            timestamp: Utc::now(),
        });

        result
    }

    /// Run one tool call with `token` bound as the bearer for its duration
    ///
    /// Without a token the call runs in whatever context the caller has.
    pub async fn call_with_token(
        &self,
        name: &str,
        arguments: &Value,
        token: Option<String>,
    ) -> Result<ToolOutput, ToolError> {
        match token {
            Some(token) => BearerPassthrough::scope(token, self.call(name, arguments)).await,
            None => self.call(name, arguments).await,
        }
    }

    async fn run(&self, name: &str, arguments: &Value) -> Result<ToolOutput, ToolError> {
        let tool = catalog::find(name).ok_or_else(|| ToolError::unknown_tool(name))?;
        let prepared = prepare_call(tool, arguments)?;

        let mut options = RequestOptions::new().skip_retry(tool.mutating);
        if let Some(body) = prepared.body {
            options = options.body(body);
        }

        debug!(tool = tool.name, path = %prepared.path, "Dispatching tool call");
        let response = self
            .client
            .request::<Value>(tool.method.as_method(), &prepared.path, options)
            .await?;

        Ok(ToolOutput {
            tool: tool.name.to_string(),
            status: response.status,
            data: response.data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthConfig, GatewayConfig};
    use crate::tools::audit::MemoryAuditSink;
    use crate::tools::ToolErrorCode;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn dispatcher(server: &MockServer) -> (ToolDispatcher, Arc<MemoryAuditSink>) {
        let config = GatewayConfig::new(server.uri(), AuthConfig::Bearer)
            .with_backoff(vec![Duration::from_millis(1)]);
        let sink = Arc::new(MemoryAuditSink::new());
        let dispatcher = ToolDispatcher::new(OvhClient::new(&config).unwrap(), sink.clone());
        (dispatcher, sink)
    }

    #[tokio::test]
    async fn test_read_tool_success_is_audited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hosting/web/example.com/database"))
            .and(header("Authorization", "Bearer caller-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["db1", "db2"])))
            .expect(1)
            .mount(&server)
            .await;

        let (dispatcher, sink) = dispatcher(&server);
        let output = dispatcher
            .call_with_token(
                "list_databases",
                &json!({"serviceName": "example.com"}),
                Some("caller-token".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(output.tool, "list_databases");
        assert_eq!(output.data, json!(["db1", "db2"]));

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tool, "list_databases");
        assert_eq!(records[0].outcome, AuditOutcome::Success);
        assert_eq!(records[0].http_status, Some(200));
    }

    #[tokio::test]
    async fn test_mutating_tool_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hosting/web/s/database/d/dump"))
            .and(body_json(json!({"date": "now"})))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let (dispatcher, sink) = dispatcher(&server);
        let err = dispatcher
            .call_with_token(
                "create_database_dump",
                &json!({"serviceName": "s", "name": "d", "date": "now"}),
                Some("tok".to_string()),
            )
            .await
            .unwrap_err();

        assert_eq!(err.code, ToolErrorCode::Internal);
        assert_eq!(err.http_status, Some(503));
        assert_eq!(sink.records()[0].code, Some("internal"));
        assert_eq!(sink.records()[0].kind, Some("service-unavailable"));
    }

    #[tokio::test]
    async fn test_read_tool_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/domain"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/domain"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["example.com"])))
            .expect(1)
            .mount(&server)
            .await;

        let (dispatcher, _) = dispatcher(&server);
        let output = dispatcher
            .call_with_token("list_domains", &Value::Null, Some("tok".to_string()))
            .await
            .unwrap();
        assert_eq!(output.data, json!(["example.com"]));
    }

    #[tokio::test]
    async fn test_validation_failure_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (dispatcher, sink) = dispatcher(&server);
        let err = dispatcher
            .call_with_token("get_domain", &json!({"domain": "../me"}), Some("tok".to_string()))
            .await
            .unwrap_err();

        assert_eq!(err.code, ToolErrorCode::InvalidParams);
        assert_eq!(err.http_status, Some(0));
        assert_eq!(sink.records()[0].outcome, AuditOutcome::Failure);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let server = MockServer::start().await;
        let (dispatcher, sink) = dispatcher(&server);
        let err = dispatcher.call("drop_database", &Value::Null).await.unwrap_err();
        assert_eq!(err.code, ToolErrorCode::InvalidParams);
        assert_eq!(sink.records()[0].code, Some("invalid-params"));
    }

    #[tokio::test]
    async fn test_missing_bearer_token_is_permission_denied() {
        let server = MockServer::start().await;
        let (dispatcher, _) = dispatcher(&server);
        let err = dispatcher.call("list_domains", &Value::Null).await.unwrap_err();
        assert_eq!(err.code, ToolErrorCode::PermissionDenied);
        assert!(!err.message.contains("Bearer"));
    }
}
