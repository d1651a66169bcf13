use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, instrument, warn};

use super::protocol::{
    JsonRpcRequest, JsonRpcResponse, ProtocolError, ToolContent, ToolDefinition, ToolResult,
    DEFAULT_PROTOCOL_VERSION,
};
use crate::scanner::{Language, ScanRequest, Scanner};

pub const SERVER_NAME: &str = "patchguard-mcp";
pub const SCAN_TOOL: &str = "scan_code";

#[derive(Debug, Deserialize)]
struct ScanCodeArgs {
    language: String,
    code: String,
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// MCP server exposing the `scan_code` tool. Requests are handled one at a
/// time in arrival order.
pub struct McpServer<S: Scanner> {
    scanner: Arc<S>,
}

impl<S: Scanner> McpServer<S> {
    pub fn new(scanner: S) -> Self {
        Self {
            scanner: Arc::new(scanner),
        }
    }

    pub fn from_shared(scanner: Arc<S>) -> Self {
        Self { scanner }
    }

    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        let languages: Vec<&str> = Language::ALL.iter().map(|lang| lang.as_str()).collect();
        vec![ToolDefinition {
            name: SCAN_TOOL.to_string(),
            description: "Scan a code snippet. Python gets bandit (security) and ruff (style) static analysis; every language gets a short LLM security review when configured. Returns {language, security_static_analysis, style_static_analysis, llm_review}.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "language": {
                        "type": "string",
                        "enum": languages,
                        "description": "Programming language of the snippet"
                    },
                    "code": {
                        "type": "string",
                        "description": "The source code to scan"
                    }
                },
                "required": ["language", "code"]
            }),
        }]
    }

    /// Call a tool by name. Bad arguments become an `isError` result; only
    /// fatal scan failures are protocol errors.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult, ProtocolError> {
        if name != SCAN_TOOL {
            return Ok(ToolResult::error(format!("Unknown tool: {name}")));
        }
        let args: ScanCodeArgs = match serde_json::from_value(arguments) {
            Ok(args) => args,
            Err(err) => return Ok(ToolResult::error(format!("Invalid arguments: {err}"))),
        };
        if let Err(err) = args.language.parse::<Language>() {
            return Ok(ToolResult::error(err.to_string()));
        }

        let request = ScanRequest::new(args.language, args.code);
        let result = self
            .scanner
            .scan(&request)
            .await
            .map_err(|err| ProtocolError::Internal(err.to_string()))?;
        let structured =
            serde_json::to_value(&result).map_err(|err| ProtocolError::Internal(err.to_string()))?;
        let text = serde_json::to_string_pretty(&structured)
            .map_err(|err| ProtocolError::Internal(err.to_string()))?;
        Ok(ToolResult {
            content: vec![ToolContent::Text { text }],
            structured_content: Some(structured),
            is_error: false,
        })
    }

    /// Handle one framed message. Returns `None` for notifications.
    pub async fn handle_message(&self, raw: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(err) => {
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    ProtocolError::Parse(err.to_string()),
                ))
            }
        };
        let id_hint = value.get("id").cloned().unwrap_or(Value::Null);
        // A present-but-null id is neither a request nor a notification.
        if value.get("id").is_some_and(Value::is_null) {
            return Some(JsonRpcResponse::failure(
                Value::Null,
                ProtocolError::InvalidRequest("request id must not be null".to_string()),
            ));
        }
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(err) => {
                return Some(JsonRpcResponse::failure(
                    id_hint,
                    ProtocolError::InvalidRequest(err.to_string()),
                ))
            }
        };
        self.handle_request(request).await
    }

    #[instrument(skip(self, request), fields(method = %request.method))]
    async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            debug!("notification received");
            return None;
        };
        let outcome = match request.method.as_str() {
            "initialize" => Ok(self.initialize(&request.params)),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.list_tools() })),
            "tools/call" => self.tools_call(request.params).await,
            other => Err(ProtocolError::MethodNotFound(other.to_string())),
        };
        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(err) => {
                warn!(code = err.code(), error = %err, "request failed");
                JsonRpcResponse::failure(id, err)
            }
        })
    }

    fn initialize(&self, params: &Value) -> Value {
        let protocol_version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_PROTOCOL_VERSION);
        json!({
            "protocolVersion": protocol_version,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            }
        })
    }

    async fn tools_call(&self, params: Value) -> Result<Value, ProtocolError> {
        let params: CallParams = serde_json::from_value(params)
            .map_err(|err| ProtocolError::InvalidParams(err.to_string()))?;
        let result = self.call_tool(&params.name, params.arguments).await?;
        serde_json::to_value(result).map_err(|err| ProtocolError::Internal(err.to_string()))
    }

    /// Serve newline-delimited JSON-RPC until the reader reaches EOF.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(server = SERVER_NAME, "MCP server listening on stdio");
        let mut lines = reader.lines();
        while let Some(line) = lines
            .next_line()
            .await
            .context("failed to read MCP request")?
        {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let Some(response) = self.handle_message(trimmed).await else {
                continue;
            };
            let mut payload = match serde_json::to_string(&response) {
                Ok(payload) => payload,
                Err(err) => {
                    error!(error = %err, "failed to encode MCP response");
                    continue;
                }
            };
            payload.push('\n');
            writer
                .write_all(payload.as_bytes())
                .await
                .context("failed to write MCP response")?;
            writer.flush().await.context("failed to flush MCP response")?;
        }
        info!("MCP client closed the connection");
        Ok(())
    }
}
