//! Tool Registry & Dispatch Gateway
//!
//! The registry is filled once at startup and frozen into a [`Gateway`].
//! The gateway turns one JSON-RPC request into at most one response and never
//! lets a handler failure escape: errors become `isError` results and the
//! transport keeps serving.

mod handlers;
pub mod redact;

use std::collections::BTreeMap;
use std::sync::Arc;

use jsonschema::Validator;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::protocol::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, ServerInfo, Tool, ToolDefinition, ToolError,
};

pub use handlers::*;

/// MCP protocol revision announced on `initialize`
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Message shown to callers in place of connection failure details
pub const STORE_UNAVAILABLE: &str = "store temporarily unavailable, retry later";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    Duplicate(String),

    #[error("tool '{name}' has an invalid input schema: {reason}")]
    InvalidSchema { name: String, reason: String },
}

struct RegisteredTool {
    definition: ToolDefinition,
    validator: Validator,
    handler: Arc<dyn Tool>,
}

/// Name → {definition, schema validator, handler}
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, compiling its input schema
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<&mut Self, RegistryError> {
        let definition = tool.definition();
        if self.tools.contains_key(&definition.name) {
            return Err(RegistryError::Duplicate(definition.name));
        }
        let validator = jsonschema::validator_for(&definition.input_schema).map_err(|e| {
            RegistryError::InvalidSchema {
                name: definition.name.clone(),
                reason: e.to_string(),
            }
        })?;

        self.tools.insert(
            definition.name.clone(),
            RegisteredTool {
                definition,
                validator,
                handler: tool,
            },
        );
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition.clone()).collect()
    }
}

/// Request router over a frozen tool registry
pub struct Gateway {
    server_info: ServerInfo,
    registry: ToolRegistry,
}

impl Gateway {
    pub fn new(server_info: ServerInfo, registry: ToolRegistry) -> Self {
        Self {
            server_info,
            registry,
        }
    }

    /// Get the number of registered tools
    pub fn tool_count(&self) -> usize {
        self.registry.len()
    }

    /// Handle one raw request line; `None` for notifications
    pub async fn handle_message(&self, line: &str) -> Option<String> {
        let raw: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => return Some(encode(JsonRpcError::parse_error(Value::Null, e.to_string()))),
        };

        let request: JsonRpcRequest = match serde_json::from_value(raw.clone()) {
            Ok(request) => request,
            Err(e) => {
                let id = raw.get("id").cloned().unwrap_or(Value::Null);
                return Some(encode(JsonRpcError::invalid_request(id, e.to_string())));
            }
        };

        self.dispatch(request).await.map(|v| v.to_string())
    }

    /// Route a parsed request; `None` for notifications
    pub async fn dispatch(&self, request: JsonRpcRequest) -> Option<Value> {
        let notification = request.is_notification();
        let id = request.id.clone().unwrap_or(Value::Null);

        if !request.is_valid() {
            return reply(
                notification,
                JsonRpcError::invalid_request(id, "jsonrpc must be '2.0'".to_string()),
            );
        }

        let response = match request.method.as_str() {
            "initialize" => success(id, self.initialize_result()),
            "notifications/initialized" => return None,
            "ping" => success(id, json!({})),
            "list_tools" | "tools/list" => success(id, json!({ "tools": self.registry.definitions() })),
            "call_tool" | "tools/call" => self.handle_tool_call(id, request.params).await,
            _ => {
                debug!(method = %request.method, "unknown method");
                to_value(JsonRpcError::method_not_found(id, request.method))
            }
        };

        if notification {
            None
        } else {
            Some(response)
        }
    }

    fn initialize_result(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": self.server_info.name,
                "version": self.server_info.version
            }
        })
    }

    async fn handle_tool_call(&self, id: Value, params: Option<Value>) -> Value {
        let Some(params) = params.filter(Value::is_object) else {
            return to_value(JsonRpcError::invalid_params(
                id,
                "params must be an object with 'name' and 'arguments'".to_string(),
            ));
        };
        let Some(name) = extract_tool_name(&params) else {
            return to_value(JsonRpcError::invalid_params(id, "missing tool name".to_string()));
        };

        let Some(tool) = self.registry.tools.get(name) else {
            warn!(tool = name, "call for unregistered tool");
            return to_value(JsonRpcError::tool_not_found(id, name.to_string()));
        };

        let arguments = extract_arguments(&params);
        if let Some(violation) = tool.validator.iter_errors(&arguments).next() {
            return invalid_arguments(id, name, violation);
        }

        let summary = redact::summarize(&arguments);
        let handler = Arc::clone(&tool.handler);
        // Own task so a panicking handler only fails this call
        let mut task = AbortOnDrop(tokio::spawn(async move {
            handler.execute(arguments).await
        }));
        let outcome = (&mut task.0).await;

        let result = match outcome {
            Ok(Ok(value)) => {
                debug!(tool = name, "tool call succeeded");
                text_response(value)
            }
            Ok(Err(err)) if err.is_invalid_arguments() => {
                return invalid_arguments(id, name, err);
            }
            Ok(Err(err)) if err.is_transient() => {
                warn!(tool = name, args = %summary, error = %err, "tool call hit a store outage");
                error_response(STORE_UNAVAILABLE.to_string())
            }
            Ok(Err(err)) => {
                warn!(tool = name, args = %summary, error = %err, "tool call failed");
                error_response(err.to_string())
            }
            Err(join) => {
                error!(tool = name, args = %summary, error = %join, "tool handler panicked");
                error_response(ToolError::Failed(format!("tool '{}' crashed", name)).to_string())
            }
        };
        success(id, result)
    }
}

fn invalid_arguments(id: Value, name: &str, reason: impl std::fmt::Display) -> Value {
    let details = format!("invalid arguments for '{}': {}", name, reason);
    debug!(tool = name, %details, "rejected tool call");
    to_value(JsonRpcError::new(
        id,
        crate::protocol::INVALID_PARAMS,
        "Invalid params".to_string(),
        Some(json!({ "tool": name, "details": details })),
    ))
}

/// Aborts the handler task when the request future is dropped mid-call
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn success(id: Value, result: Value) -> Value {
    to_value(JsonRpcResponse::new(id, result))
}

fn reply(notification: bool, err: JsonRpcError) -> Option<Value> {
    if notification {
        None
    } else {
        Some(to_value(err))
    }
}

fn to_value<T: serde::Serialize>(message: T) -> Value {
    serde_json::to_value(message).unwrap_or_else(|e| {
        json!({
            "jsonrpc": "2.0",
            "id": null,
            "error": { "code": crate::protocol::INTERNAL_ERROR, "message": e.to_string() }
        })
    })
}

fn encode<T: serde::Serialize>(message: T) -> String {
    to_value(message).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::protocol::ToolResult;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new(
                "echo",
                "Echo the message back",
                json!({
                    "type": "object",
                    "properties": { "message": { "type": "string" } },
                    "required": ["message"]
                }),
            )
        }

        async fn execute(&self, params: Value) -> ToolResult<Value> {
            Ok(params["message"].clone())
        }
    }

    struct BadSchema;

    #[async_trait]
    impl Tool for BadSchema {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new("bad", "Broken schema", json!({ "type": 12 }))
        }

        async fn execute(&self, _params: Value) -> ToolResult<Value> {
            Ok(Value::Null)
        }
    }

    struct Sleeper {
        finished: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait]
    impl Tool for Sleeper {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new("sleep", "Sleep, then record completion", json!({"type": "object"}))
        }

        async fn execute(&self, _params: Value) -> ToolResult<Value> {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            self.finished.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(Value::Null)
        }
    }

    fn gateway() -> Gateway {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo)).unwrap();
        Gateway::new(ServerInfo::default(), registry)
    }

    #[test]
    fn test_registry_rejects_duplicates_and_bad_schemas() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo)).unwrap();
        assert!(matches!(
            registry.register(Arc::new(Echo)),
            Err(RegistryError::Duplicate(_))
        ));
        assert!(matches!(
            registry.register(Arc::new(BadSchema)),
            Err(RegistryError::InvalidSchema { .. })
        ));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_parse_error_has_null_id() {
        let reply = gateway().handle_message("{not json").await.unwrap();
        let reply: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(reply["id"], Value::Null);
        assert_eq!(reply["error"]["code"], crate::protocol::PARSE_ERROR);
    }

    #[tokio::test]
    async fn test_request_without_method_is_invalid() {
        let reply = gateway().handle_message(r#"{"id": 4}"#).await.unwrap();
        let reply: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(reply["id"], 4);
        assert_eq!(reply["error"]["code"], crate::protocol::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_notifications_get_no_reply() {
        let gw = gateway();
        assert!(gw
            .handle_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await
            .is_none());
        assert!(gw
            .handle_message(r#"{"jsonrpc":"2.0","method":"list_tools"}"#)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_initialize_announces_server() {
        let reply = gateway()
            .handle_message(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
            .await
            .unwrap();
        let reply: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(reply["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(reply["result"]["serverInfo"]["name"], "stream-bus");
    }

    #[tokio::test]
    async fn test_call_echoes_string_id() {
        let reply = gateway()
            .handle_message(
                r#"{"jsonrpc":"2.0","id":"req-9","method":"call_tool","params":{"name":"echo","arguments":{"message":"hi"}}}"#,
            )
            .await
            .unwrap();
        let reply: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(reply["id"], "req-9");
        assert_eq!(reply["result"]["structuredContent"], "hi");
        assert_eq!(reply["result"]["isError"], false);
    }

    #[tokio::test]
    async fn test_missing_params_is_invalid_params() {
        let reply = gateway()
            .handle_message(r#"{"jsonrpc":"2.0","id":2,"method":"tools/call"}"#)
            .await
            .unwrap();
        let reply: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(reply["error"]["code"], crate::protocol::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_dropped_call_aborts_its_handler() {
        let finished = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(Sleeper { finished: finished.clone() }))
            .unwrap();
        let gateway = Arc::new(Gateway::new(ServerInfo::default(), registry));

        let call = tokio::spawn({
            let gateway = gateway.clone();
            async move {
                gateway
                    .handle_message(
                        r#"{"jsonrpc":"2.0","id":1,"method":"call_tool","params":{"name":"sleep","arguments":{}}}"#,
                    )
                    .await
            }
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        call.abort();
        assert!(call.await.unwrap_err().is_cancelled());

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert!(!finished.load(std::sync::atomic::Ordering::SeqCst));
    }
}
