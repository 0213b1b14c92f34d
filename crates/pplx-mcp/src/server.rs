//! The stdio MCP server loop and request handling.

use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

use pplx_config::QueryDefaults;
use pplx_core::{Dispatcher, Formatted, SharedTransport, Sink, compile, format, validate};

use crate::error::Result;
use crate::framing::{Framing, read_frame, write_frame};
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, MCP_PROTOCOL_VERSION, ServerCapabilities,
    ServerInfo, ToolsCapability,
};
use crate::tool::{QueryArguments, TOOL_NAME, tool_info};

/// MCP server exposing the `perplexity_query` tool.
#[derive(Clone)]
pub struct McpServer {
    dispatcher: Dispatcher,
    defaults: QueryDefaults,
    info: ServerInfo,
}

impl McpServer {
    /// Create a server over `transport` with no configured defaults.
    pub fn new(transport: SharedTransport) -> Self {
        Self {
            dispatcher: Dispatcher::new(transport),
            defaults: QueryDefaults::default(),
            info: ServerInfo::default(),
        }
    }

    /// Set the defaults tool arguments are merged over.
    pub fn with_defaults(mut self, defaults: QueryDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Serve requests until `reader` reaches end of input.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut reader = BufReader::new(reader);
        tracing::info!(server = %self.info.name, "MCP server listening on stdio");

        loop {
            let frame = match read_frame(&mut reader).await {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(crate::McpError::Io(e)) => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(error = %e, "Unreadable message");
                    let response = JsonRpcResponse::failure(
                        Value::Null,
                        JsonRpcError::parse_error(e.to_string()),
                    );
                    self.reply(&mut writer, Framing::Line, &response).await?;
                    continue;
                }
            };

            let response = match serde_json::from_str::<Value>(&frame.body) {
                Ok(message) => self.handle_message(message).await,
                Err(e) => {
                    tracing::warn!(error = %e, "Message is not valid JSON");
                    Some(JsonRpcResponse::failure(
                        Value::Null,
                        JsonRpcError::parse_error(format!("invalid JSON: {}", e)),
                    ))
                }
            };

            if let Some(response) = response {
                self.reply(&mut writer, frame.framing, &response).await?;
            }
        }

        tracing::info!("MCP client disconnected");
        Ok(())
    }

    async fn reply<W>(
        &self,
        writer: &mut W,
        framing: Framing,
        response: &JsonRpcResponse,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let body = serde_json::to_string(response)?;
        write_frame(writer, framing, &body).await
    }

    /// Handle one decoded message, returning the response if one is due.
    pub async fn handle_message(&self, message: Value) -> Option<JsonRpcResponse> {
        let id = message.get("id").cloned();
        let request: JsonRpcRequest = match serde_json::from_value(message) {
            Ok(request) => request,
            Err(e) => {
                return Some(JsonRpcResponse::failure(
                    id.unwrap_or(Value::Null),
                    JsonRpcError::invalid_request(format!("invalid request: {}", e)),
                ));
            }
        };

        let Some(id) = request.id.clone() else {
            tracing::debug!(method = %request.method, "Notification received");
            return None;
        };

        tracing::debug!(method = %request.method, id = %id, "Request received");
        let outcome = match request.method.as_str() {
            "initialize" => self.initialize(request.params),
            "ping" => Ok(json!({})),
            "tools/list" => serde_json::to_value(ListToolsResult {
                tools: vec![tool_info()],
            })
            .map_err(|e| JsonRpcError::internal(e.to_string())),
            "tools/call" => self.call_tool(request.params).await,
            other => Err(JsonRpcError::method_not_found(other)),
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        })
    }

    fn initialize(&self, params: Option<Value>) -> std::result::Result<Value, JsonRpcError> {
        let params: InitializeParams = params
            .map(serde_json::from_value::<InitializeParams>)
            .transpose()
            .map_err(|e| JsonRpcError::invalid_params(format!("invalid initialize params: {}", e)))?
            .unwrap_or_default();
        tracing::info!(
            client = %params.client_info.name,
            client_version = %params.client_info.version,
            protocol = %params.protocol_version,
            "MCP client initialized"
        );

        serde_json::to_value(InitializeResult {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(false),
                }),
            },
            server_info: self.info.clone(),
        })
        .map_err(|e| JsonRpcError::internal(e.to_string()))
    }

    async fn call_tool(&self, params: Option<Value>) -> std::result::Result<Value, JsonRpcError> {
        let params: CallToolParams = params
            .ok_or_else(|| JsonRpcError::invalid_params("missing tools/call params"))
            .and_then(|p| {
                serde_json::from_value(p).map_err(|e| {
                    JsonRpcError::invalid_params(format!("invalid tools/call params: {}", e))
                })
            })?;
        if params.name != TOOL_NAME {
            return Err(JsonRpcError::invalid_params(format!(
                "unknown tool: {}",
                params.name
            )));
        }

        let args = QueryArguments::parse(params.arguments)?;
        match self.run_query(args).await {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::warn!(error = %e, "perplexity_query failed");
                serde_json::to_value(CallToolResult::error(e.to_string()))
                    .map_err(|e| JsonRpcError::internal(e.to_string()))
            }
        }
    }

    /// Run the shared pipeline: validate, compile, dispatch, format.
    async fn run_query(&self, args: QueryArguments) -> pplx_core::Result<Value> {
        let params = args.into_parameter_set(&self.defaults);
        validate(&params)?;
        let request = compile(&params)?;
        let response = self.dispatcher.dispatch(&request, params.stream).await?;

        let Formatted::ToolResult(mut result) = format(&response, Sink::ToolResult) else {
            return Err(pplx_core::Error::Stream("unexpected formatter output".to_string()));
        };
        if !request.warnings.is_empty() {
            let warnings: Vec<String> = request
                .warnings
                .iter()
                .map(|w| format!("warning: {}", w))
                .collect();
            if let Some(content) = result.get_mut("content").and_then(Value::as_array_mut) {
                content.push(json!({ "type": "text", "text": warnings.join("\n") }));
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pplx_core::{MockTransport, TransportError};
    use std::sync::Arc;

    fn server(mock: MockTransport) -> (McpServer, Arc<MockTransport>) {
        let mock = Arc::new(mock);
        (McpServer::new(mock.clone()), mock)
    }

    fn call(arguments: Value) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "tools/call",
            "params": { "name": "perplexity_query", "arguments": arguments }
        })
    }

    #[tokio::test]
    async fn test_initialize() {
        let (s, _) = server(MockTransport::default());
        let resp = s
            .handle_message(json!({
                "jsonrpc": "2.0", "id": 1, "method": "initialize",
                "params": { "protocolVersion": "2024-11-05", "capabilities": {},
                            "clientInfo": { "name": "test", "version": "1" } }
            }))
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "pplx");
    }

    #[tokio::test]
    async fn test_notification_gets_no_response() {
        let (s, _) = server(MockTransport::default());
        let resp = s
            .handle_message(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }))
            .await;
        assert!(resp.is_none());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let (s, _) = server(MockTransport::default());
        let resp = s
            .handle_message(json!({ "jsonrpc": "2.0", "id": "x", "method": "resources/list" }))
            .await
            .unwrap();
        assert_eq!(resp.id, json!("x"));
        assert_eq!(resp.error.unwrap().code, JsonRpcError::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_request_keeps_id() {
        let (s, _) = server(MockTransport::default());
        let resp = s.handle_message(json!({ "jsonrpc": "2.0", "id": 3 })).await.unwrap();
        assert_eq!(resp.id, json!(3));
        assert_eq!(resp.error.unwrap().code, JsonRpcError::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_tool_call_success() {
        let (s, mock) = server(MockTransport::with_text("Ferris is a crab."));
        let resp = s.handle_message(call(json!({ "query": "who is ferris" }))).await.unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], false);
        assert!(result["content"][0]["text"].as_str().unwrap().contains("Ferris is a crab."));
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn test_tool_call_streaming_returns_final_text() {
        let (s, _) = server(MockTransport::streaming(["Fer", "Ferris", "Ferris!"]));
        let resp = s
            .handle_message(call(json!({ "query": "q", "stream": true })))
            .await
            .unwrap();
        let text = resp.result.unwrap()["content"][0]["text"].as_str().unwrap().to_string();
        assert!(text.starts_with("Ferris!"));
    }

    #[tokio::test]
    async fn test_validation_failure_is_tool_error() {
        let (s, mock) = server(MockTransport::with_text("unused"));
        let resp = s
            .handle_message(call(json!({
                "query": "q", "model": "sonar-pro",
                "response_format_json_schema": "{}", "response_format_regex": ".*"
            })))
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"].as_str().unwrap().contains("response_format"));
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn test_compile_failure_is_tool_error() {
        let (s, _) = server(MockTransport::with_text("unused"));
        let resp = s
            .handle_message(call(json!({ "query": "q", "search_after_date": "13/32/2024" })))
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"].as_str().unwrap().contains("search_after_date"));
    }

    #[tokio::test]
    async fn test_request_failure_is_tool_error() {
        let (s, _) = server(MockTransport::failing(TransportError::Api {
            status: 429,
            message: "rate limited".to_string(),
        }));
        let resp = s.handle_message(call(json!({ "query": "q" }))).await.unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"].as_str().unwrap().contains("rate limited"));
    }

    #[tokio::test]
    async fn test_unknown_tool_and_bad_arguments() {
        let (s, _) = server(MockTransport::default());
        let resp = s
            .handle_message(json!({
                "jsonrpc": "2.0", "id": 1, "method": "tools/call",
                "params": { "name": "other_tool", "arguments": {} }
            }))
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, JsonRpcError::INVALID_PARAMS);

        let resp = s.handle_message(call(json!({ "temperature": 1.0 }))).await.unwrap();
        assert_eq!(resp.error.unwrap().code, JsonRpcError::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_warnings_appended() {
        let (s, _) = server(MockTransport::with_text("ok"));
        let resp = s
            .handle_message(call(json!({ "query": "q", "image_formats": ["tiff"] })))
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], false);
        assert!(result["content"][1]["text"].as_str().unwrap().contains("tiff"));
    }

    #[tokio::test]
    async fn test_defaults_apply_to_tool_calls() {
        let mock = Arc::new(MockTransport::with_text("ok"));
        let s = McpServer::new(mock.clone()).with_defaults(QueryDefaults {
            model: Some("sonar-pro".to_string()),
            ..Default::default()
        });
        s.handle_message(call(json!({ "query": "q" }))).await.unwrap();
        let sent = &mock.requests()[0];
        assert_eq!(sent[0], pplx_core::Directive::Model("sonar-pro".to_string()));
    }
}
