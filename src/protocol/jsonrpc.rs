//! JSON-RPC 2.0 envelope types

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// JSON-RPC 2.0 Request
#[derive(Deserialize, Debug, Clone)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    pub id: Option<Value>,
    pub method: String,
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Requests may omit `jsonrpc`; when present it must be "2.0"
    pub fn is_valid(&self) -> bool {
        self.jsonrpc.as_deref().map_or(true, |v| v == "2.0")
    }

    /// Check if this is a notification (no id)
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 Success Response
#[derive(Serialize, Debug)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    pub result: Value,
}

impl JsonRpcResponse {
    pub fn new(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result,
        }
    }
}

/// JSON-RPC 2.0 Error Response
#[derive(Serialize, Debug)]
pub struct JsonRpcError {
    pub jsonrpc: String,
    pub id: Value,
    pub error: ErrorObject,
}

impl JsonRpcError {
    pub fn new(id: Value, code: i32, message: String, data: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            error: ErrorObject {
                code,
                message,
                data,
            },
        }
    }

    pub fn parse_error(id: Value, details: String) -> Self {
        Self::new(
            id,
            PARSE_ERROR,
            "Parse error".to_string(),
            Some(serde_json::json!({"details": details})),
        )
    }

    pub fn invalid_request(id: Value, details: String) -> Self {
        Self::new(
            id,
            INVALID_REQUEST,
            "Invalid Request".to_string(),
            Some(serde_json::json!({"details": details})),
        )
    }

    pub fn method_not_found(id: Value, method: String) -> Self {
        Self::new(
            id,
            METHOD_NOT_FOUND,
            "Method not found".to_string(),
            Some(serde_json::json!({"method": method})),
        )
    }

    /// Unknown tool name on a call
    pub fn tool_not_found(id: Value, tool: String) -> Self {
        Self::new(
            id,
            METHOD_NOT_FOUND,
            format!("Unknown tool: {}", tool),
            Some(serde_json::json!({"tool": tool})),
        )
    }

    pub fn invalid_params(id: Value, details: String) -> Self {
        Self::new(
            id,
            INVALID_PARAMS,
            "Invalid params".to_string(),
            Some(serde_json::json!({"details": details})),
        )
    }
}

/// JSON-RPC 2.0 Error Object
#[derive(Serialize, Debug)]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}
