//! Get current time tool

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::protocol::{Tool, ToolDefinition, ToolResult};
use crate::utils::get_current_time;

/// Tool for getting the current datetime and timestamp
pub struct GetCurrentTimeTool;

impl GetCurrentTimeTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GetCurrentTimeTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for GetCurrentTimeTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "get_current_time",
            "Get the current datetime and timestamp, e.g. to compare with entry IDs",
            json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        )
    }

    async fn execute(&self, _params: Value) -> ToolResult<Value> {
        Ok(get_current_time())
    }
}
