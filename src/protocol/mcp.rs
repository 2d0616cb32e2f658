//! Tool definitions and the handler interface

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::error::BusError;

/// Result type for tool handlers
pub type ToolResult<T> = Result<T, ToolError>;

/// Errors a tool handler can report.
///
/// Argument errors become `-32602` replies; everything else an `isError` result.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Failed(String),
}

impl ToolError {
    /// Infrastructure failure whose details stay in the log
    pub fn is_transient(&self) -> bool {
        matches!(self, ToolError::Bus(err) if err.is_connection())
    }

    /// Arguments that passed the schema but not the handler's own decoding
    pub fn is_invalid_arguments(&self) -> bool {
        matches!(
            self,
            ToolError::InvalidArguments(_) | ToolError::Bus(BusError::InvalidId(_))
        )
    }
}

/// Tool definition returned by `list_tools`
#[derive(Serialize, Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl ToolDefinition {
    pub fn new(name: &str, description: &str, input_schema: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
        }
    }
}

/// Server information for the MCP handshake
#[derive(Clone, Debug)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl ServerInfo {
    pub fn new(name: String, version: String) -> Self {
        Self { name, version }
    }
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "stream-bus".to_string(),
            version: crate::VERSION.to_string(),
        }
    }
}

/// Uniform handler interface for everything the gateway can call
///
/// Arguments have already been validated against `input_schema` when
/// `execute` runs.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool definition for list_tools
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with the given arguments
    async fn execute(&self, params: Value) -> ToolResult<Value>;
}
