//! Stream listing tool

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::protocol::{Tool, ToolDefinition, ToolResult};
use crate::streams::StreamStore;
use crate::tools::parse_args;

#[derive(Deserialize)]
struct ListArgs {
    #[serde(default = "default_pattern")]
    pattern: String,
}

fn default_pattern() -> String {
    "*".to_string()
}

/// Tool for listing streams with their length and group count
pub struct StreamListTool {
    store: Arc<dyn StreamStore>,
}

impl StreamListTool {
    pub fn new(store: Arc<dyn StreamStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for StreamListTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "stream_list",
            "List streams whose name matches a glob pattern",
            json!({
                "type": "object",
                "properties": {
                    "pattern": {
                        "type": "string",
                        "default": "*",
                        "description": "Glob pattern, e.g. 'orders.*'"
                    }
                },
                "required": []
            }),
        )
    }

    async fn execute(&self, params: Value) -> ToolResult<Value> {
        let args: ListArgs = parse_args(params)?;
        let streams = self.store.streams(&args.pattern).await?;
        Ok(json!({
            "pattern": args.pattern,
            "streams": streams
        }))
    }
}
