//! JSON-RPC method routing.
//!
//! The dispatcher holds no per-request state: every transport hands it one
//! decoded message at a time and frames whatever comes back. Notifications
//! are never answered.

use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use serde_json::{json, Value};

use crate::mcp::protocol::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId, DEFAULT_PROTOCOL_VERSION,
    SUPPORTED_PROTOCOL_VERSIONS,
};
use crate::mcp::tools::{ToolCallResult, ToolError, ToolRegistry};

/// Name reported in `serverInfo`.
pub const SERVER_NAME: &str = "aws-docs-mcp";

const INSTRUCTIONS: &str = "\
Tools for AWS public documentation:
- search_documentation: find pages for a query; page through results with start_index.
- read_documentation: fetch a docs.aws.amazon.com page as Markdown; long pages arrive in chunks, \
continue with the start_index named in the truncation notice.
- recommend: related pages for a documentation URL or a content excerpt.";

/// Routes JSON-RPC requests to protocol handlers and tools.
#[derive(Debug)]
pub struct McpDispatcher {
    tools: ToolRegistry,
}

impl McpDispatcher {
    pub fn new(tools: ToolRegistry) -> Self {
        Self { tools }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Handle one raw message, returning the serialised reply if there is one.
    pub async fn handle_raw(&self, raw: &str) -> Option<String> {
        let reply = match serde_json::from_str::<Value>(raw) {
            Ok(value) => self.handle_value(value).await,
            Err(err) => {
                tracing::debug!(error = %err, "unparseable message");
                Some(JsonRpcResponse::failure(RequestId::Null, JsonRpcError::parse_error(err)))
            }
        };
        reply.map(|response| response.to_json())
    }

    /// Handle one decoded JSON value.
    pub async fn handle_value(&self, value: Value) -> Option<JsonRpcResponse> {
        if value.is_array() {
            return Some(JsonRpcResponse::failure(
                RequestId::Null,
                JsonRpcError::invalid_request("batch requests are not supported"),
            ));
        }

        match JsonRpcRequest::from_value(value) {
            Ok(request) => self.handle(request).await,
            Err(response) => {
                tracing::info!(outcome = "failure", "rejected malformed request");
                Some(response)
            }
        }
    }

    /// Handle a validated request or notification.
    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            tracing::debug!(method = %request.method, "notification received");
            return None;
        };

        let outcome = match request.method.as_str() {
            "initialize" => Ok(Self::initialize(request.params.as_ref())),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.tools.definitions() })),
            "tools/call" => self.call_tool(request.params).await,
            "resources/list" => Ok(json!({ "resources": [] })),
            "resources/templates/list" => Ok(json!({ "resourceTemplates": [] })),
            "prompts/list" => Ok(json!({ "prompts": [] })),
            other => Err(JsonRpcError::method_not_found(other)),
        };

        match outcome {
            Ok(result) => {
                tracing::info!(method = %request.method, id = %id, outcome = "success", "request handled");
                Some(JsonRpcResponse::success(id, result))
            }
            Err(error) => {
                tracing::info!(
                    method = %request.method,
                    id = %id,
                    outcome = "failure",
                    code = error.code,
                    "request handled"
                );
                Some(JsonRpcResponse::failure(id, error))
            }
        }
    }

    fn initialize(params: Option<&Value>) -> Value {
        let requested = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str);
        let version = requested
            .filter(|v| SUPPORTED_PROTOCOL_VERSIONS.contains(v))
            .unwrap_or(DEFAULT_PROTOCOL_VERSION);

        json!({
            "protocolVersion": version,
            "capabilities": {
                "tools": { "listChanged": false },
                "resources": { "subscribe": false, "listChanged": false },
                "prompts": { "listChanged": false },
                "logging": {}
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": crate::VERSION
            },
            "instructions": INSTRUCTIONS
        })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let Some(Value::Object(mut params)) = params else {
            return Err(JsonRpcError::invalid_params("tools/call expects an object"));
        };
        let name = match params.remove("name") {
            Some(Value::String(name)) => name,
            _ => return Err(JsonRpcError::invalid_params("missing tool name")),
        };
        let arguments = match params.remove("arguments") {
            None | Some(Value::Null) => json!({}),
            Some(arguments) => arguments,
        };

        let invocation = AssertUnwindSafe(self.tools.invoke(&name, arguments)).catch_unwind();
        let result = match invocation.await {
            Ok(Ok(result)) => result,
            Ok(Err(ToolError::Internal(message))) => {
                tracing::error!(tool = %name, error = %message, "tool failed internally");
                return Err(JsonRpcError::internal(message));
            }
            Ok(Err(err)) => {
                tracing::warn!(tool = %name, error = %err, "tool returned an error");
                ToolCallResult::error(err.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(tool = %name, panic = %message, "tool panicked");
                return Err(JsonRpcError::internal(message));
            }
        };

        serde_json::to_value(result).map_err(JsonRpcError::internal)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "tool handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ExtractionStrategy;
    use crate::mcp::tools::{Tool, ToolHandler, ToolSettings};
    use crate::sources::{make_hit, MockSource};
    use std::sync::Arc;

    fn dispatcher() -> McpDispatcher {
        let source = Arc::new(MockSource::new());
        source.set_search_hits(vec![make_hit("s3/welcome", "What is Amazon S3?")]);
        McpDispatcher::new(ToolRegistry::documentation(
            source,
            ExtractionStrategy::Dom.build().unwrap(),
            ToolSettings::default(),
        ))
    }

    async fn call(dispatcher: &McpDispatcher, raw: &str) -> Value {
        let reply = dispatcher.handle_raw(raw).await.expect("expected a reply");
        serde_json::from_str(&reply).unwrap()
    }

    #[derive(Debug)]
    struct PanickingHandler;

    #[async_trait::async_trait]
    impl ToolHandler for PanickingHandler {
        async fn execute(&self, _args: Value) -> Result<ToolCallResult, ToolError> {
            panic!("index out of bounds")
        }
    }

    #[derive(Debug)]
    struct BrokenHandler;

    #[async_trait::async_trait]
    impl ToolHandler for BrokenHandler {
        async fn execute(&self, _args: Value) -> Result<ToolCallResult, ToolError> {
            Err(ToolError::Internal("state corrupted".into()))
        }
    }

    #[tokio::test]
    async fn test_tools_list_returns_exactly_three_tools() {
        let reply = call(&dispatcher(), r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#).await;
        let names: Vec<&str> = reply["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["search_documentation", "read_documentation", "recommend"]);
        assert_eq!(reply["id"], 1);
    }

    #[tokio::test]
    async fn test_missing_jsonrpc_is_invalid_request() {
        let reply = call(&dispatcher(), r#"{"method":"tools/list"}"#).await;
        assert_eq!(reply["error"]["code"], -32600);
        assert!(reply["id"].is_null());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let reply = call(&dispatcher(), r#"{"jsonrpc":"2.0","id":2,"method":"bogus"}"#).await;
        assert_eq!(reply["error"]["code"], -32601);
        assert_eq!(reply["id"], 2);
        assert!(reply.get("result").is_none());
    }

    #[tokio::test]
    async fn test_parse_error() {
        let reply = call(&dispatcher(), r#"{"jsonrpc":"2.0","id":3,"method""#).await;
        assert_eq!(reply["error"]["code"], -32700);
        assert!(reply["id"].is_null());
    }

    #[tokio::test]
    async fn test_initialize_negotiates_version() {
        let d = dispatcher();
        let reply = call(
            &d,
            r#"{"jsonrpc":"2.0","id":"init","method":"initialize","params":{"protocolVersion":"2025-03-26"}}"#,
        )
        .await;
        assert_eq!(reply["id"], "init");
        assert_eq!(reply["result"]["protocolVersion"], "2025-03-26");
        assert_eq!(reply["result"]["serverInfo"]["name"], SERVER_NAME);
        let instructions = reply["result"]["instructions"].as_str().unwrap();
        for tool in ["search_documentation", "read_documentation", "recommend"] {
            assert!(instructions.contains(tool));
        }

        let reply = call(
            &d,
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"1999-01-01"}}"#,
        )
        .await;
        assert_eq!(reply["result"]["protocolVersion"], DEFAULT_PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn test_empty_collections_and_ping() {
        let d = dispatcher();
        let reply = call(&d, r#"{"jsonrpc":"2.0","id":1,"method":"resources/list"}"#).await;
        assert_eq!(reply["result"], json!({"resources": []}));
        let reply = call(&d, r#"{"jsonrpc":"2.0","id":2,"method":"prompts/list"}"#).await;
        assert_eq!(reply["result"], json!({"prompts": []}));
        let reply = call(&d, r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#).await;
        assert_eq!(reply["result"], json!({}));
    }

    #[tokio::test]
    async fn test_notifications_get_no_reply() {
        let d = dispatcher();
        assert!(d
            .handle_raw(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await
            .is_none());
        assert!(d.handle_raw(r#"{"jsonrpc":"2.0","method":"bogus"}"#).await.is_none());
    }

    #[tokio::test]
    async fn test_tool_call_success() {
        let reply = call(
            &dispatcher(),
            r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"search_documentation","arguments":{"query":"s3"}}}"#,
        )
        .await;
        assert_eq!(reply["result"]["isError"], false);
        assert_eq!(
            reply["result"]["structuredContent"]["results"][0]["title"],
            "What is Amazon S3?"
        );
    }

    #[tokio::test]
    async fn test_tool_errors_are_results_not_protocol_errors() {
        let d = dispatcher();
        let reply = call(
            &d,
            r#"{"jsonrpc":"2.0","id":6,"method":"tools/call","params":{"name":"read_documentation","arguments":{"url":"https://example.com/page.html"}}}"#,
        )
        .await;
        assert!(reply.get("error").is_none());
        assert_eq!(reply["result"]["isError"], true);
        assert!(reply["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("docs.aws.amazon.com"));

        let reply = call(
            &d,
            r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"search_documentation","arguments":{}}}"#,
        )
        .await;
        assert_eq!(reply["result"]["isError"], true);

        let reply = call(
            &d,
            r#"{"jsonrpc":"2.0","id":8,"method":"tools/call","params":{"name":"no_such_tool"}}"#,
        )
        .await;
        assert_eq!(reply["result"]["isError"], true);
    }

    #[tokio::test]
    async fn test_tool_call_without_name_is_invalid_params() {
        let reply = call(
            &dispatcher(),
            r#"{"jsonrpc":"2.0","id":9,"method":"tools/call","params":{"arguments":{}}}"#,
        )
        .await;
        assert_eq!(reply["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn test_internal_faults_become_internal_error() {
        let mut tools = ToolRegistry::new();
        for (name, handler) in [
            ("explode", Arc::new(PanickingHandler) as Arc<dyn ToolHandler>),
            ("broken", Arc::new(BrokenHandler)),
        ] {
            tools.register(Tool {
                name: name.to_string(),
                description: String::new(),
                input_schema: json!({"type": "object"}),
                handler,
            });
        }
        let d = McpDispatcher::new(tools);

        let reply = call(
            &d,
            r#"{"jsonrpc":"2.0","id":10,"method":"tools/call","params":{"name":"explode"}}"#,
        )
        .await;
        assert_eq!(reply["error"]["code"], -32603);
        assert_eq!(reply["error"]["data"], "index out of bounds");

        let reply = call(
            &d,
            r#"{"jsonrpc":"2.0","id":11,"method":"tools/call","params":{"name":"broken"}}"#,
        )
        .await;
        assert_eq!(reply["error"]["code"], -32603);
        assert_eq!(reply["error"]["data"], "state corrupted");
    }

    #[tokio::test]
    async fn test_batch_rejected() {
        let reply = call(&dispatcher(), r#"[{"jsonrpc":"2.0","id":1,"method":"ping"}]"#).await;
        assert_eq!(reply["error"]["code"], -32600);
    }
}
