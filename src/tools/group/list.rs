//! Group listing tool

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::coordinator::Coordinator;
use crate::protocol::{Tool, ToolDefinition, ToolResult};
use crate::tools::{name_schema, parse_args};

#[derive(Deserialize)]
struct ListArgs {
    stream: String,
}

/// Tool for inspecting the consumer groups of a stream
pub struct GroupListTool {
    coordinator: Arc<Coordinator>,
}

impl GroupListTool {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl Tool for GroupListTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "group_list",
            "List consumer groups of a stream with consumers, pending count, last delivered ID and lag. Always fetched live.",
            json!({
                "type": "object",
                "properties": {
                    "stream": name_schema("Stream name")
                },
                "required": ["stream"]
            }),
        )
    }

    async fn execute(&self, params: Value) -> ToolResult<Value> {
        let args: ListArgs = parse_args(params)?;
        let groups = self.coordinator.groups(&args.stream).await?;
        Ok(json!({
            "stream": args.stream,
            "groups": groups
        }))
    }
}
