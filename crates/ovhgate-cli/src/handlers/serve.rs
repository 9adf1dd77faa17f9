//! Serve command handler
//!
//! Reads one JSON request per line from stdin and writes one JSON response
//! per line to stdout:
//!
//! ```text
//! -> {"id": 1, "tool": "get_domain", "arguments": {"domain": "example.com"}, "token": "..."}
//! <- {"id": 1, "result": {"tool": "get_domain", "status": 200, "data": {...}}}
//! <- {"id": 2, "error": {"code": "invalid-params", "message": "..."}}
//! ```
//!
//! Requests run concurrently, so responses may arrive out of order; the
//! `id` is echoed back unchanged. A request's `token` is bound for that
//! call only.

use crate::cli::ServeArgs;
use crate::config::Config;
use crate::error::{Error, Result};
use ovhgate_core::tools::ToolErrorCode;
use ovhgate_core::{ToolDispatcher, ToolError, ToolOutput};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::task::JoinSet;
use tracing::{debug, info};

/// One inbound line
#[derive(Deserialize)]
struct ServeRequest {
    #[serde(default)]
    id: Value,
    tool: String,
    #[serde(default)]
    arguments: Value,
    #[serde(default)]
    token: Option<String>,
}

/// One outbound line
#[derive(Debug, Serialize)]
struct ServeResponse {
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<ToolOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ToolError>,
}

impl ServeResponse {
    fn from_result(id: Value, result: std::result::Result<ToolOutput, ToolError>) -> Self {
        match result {
            Ok(output) => Self {
                id,
                result: Some(output),
                error: None,
            },
            Err(error) => Self {
                id,
                result: None,
                error: Some(error),
            },
        }
    }
}

/// Totals reported when the input closes
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServeStats {
    pub received: usize,
    pub failed: usize,
}

/// Handle the serve command on stdin/stdout
pub async fn handle_serve(args: ServeArgs, config: &Config) -> Result<()> {
    let dispatcher = super::build_dispatcher(config)?;
    info!(max_concurrency = args.max_concurrency, "Serving tool calls on stdin");

    let stats = serve(
        dispatcher,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        args.max_concurrency,
        args.token,
    )
    .await?;

    info!(received = stats.received, failed = stats.failed, "Input closed");
    Ok(())
}

/// Run the line protocol until `reader` reaches end of input
///
/// Every in-flight call is finished and answered before this returns.
pub async fn serve<R, W>(
    dispatcher: ToolDispatcher,
    reader: R,
    mut writer: W,
    max_concurrency: usize,
    default_token: Option<String>,
) -> Result<ServeStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let limit = max_concurrency.max(1);
    let mut lines = reader.lines();
    let mut tasks: JoinSet<ServeResponse> = JoinSet::new();
    let mut input_open = true;
    let mut stats = ServeStats::default();

    loop {
        tokio::select! {
            line = lines.next_line(), if input_open && tasks.len() < limit => {
                match line? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => {
                        stats.received += 1;
                        match parse_request(&line) {
                            Ok(request) => {
                                let dispatcher = dispatcher.clone();
                                let token = request.token.clone().or_else(|| default_token.clone());
                                tasks.spawn(run_request(dispatcher, request, token));
                            }
                            Err(response) => {
                                stats.failed += 1;
                                write_response(&mut writer, &response).await?;
                            }
                        }
                    }
                    None => input_open = false,
                }
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                let response = joined.map_err(|e| Error::other(format!("Tool call task failed: {}", e)))?;
                if response.error.is_some() {
                    stats.failed += 1;
                }
                write_response(&mut writer, &response).await?;
            }
            else => break,
        }
    }

    writer.flush().await?;
    Ok(stats)
}

async fn run_request(dispatcher: ToolDispatcher, request: ServeRequest, token: Option<String>) -> ServeResponse {
    debug!(id = %request.id, tool = %request.tool, "Received tool call");
    let result = dispatcher
        .call_with_token(&request.tool, &request.arguments, token)
        .await;
    ServeResponse::from_result(request.id, result)
}

/// Parse a request line, or build the error response for it
///
/// Parse errors only report position and category so a malformed token
/// never reaches the output.
fn parse_request(line: &str) -> std::result::Result<ServeRequest, ServeResponse> {
    serde_json::from_str::<ServeRequest>(line).map_err(|e| {
        let id = serde_json::from_str::<Value>(line)
            .ok()
            .and_then(|v| v.get("id").cloned())
            .unwrap_or(Value::Null);
        ServeResponse::from_result(
            id,
            Err(ToolError {
                code: ToolErrorCode::InvalidParams,
                message: format!("Malformed request ({:?} error at column {})", e.classify(), e.column()),
                kind: None,
                http_status: None,
            }),
        )
    })
}

async fn write_response<W: AsyncWrite + Unpin>(writer: &mut W, response: &ServeResponse) -> Result<()> {
    let mut line = serde_json::to_vec(response)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}
