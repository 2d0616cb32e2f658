//! Acknowledge tool

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::coordinator::Coordinator;
use crate::protocol::{Tool, ToolDefinition, ToolResult};
use crate::tools::{ids_schema, name_schema, parse_args, parse_ids};

#[derive(Deserialize)]
struct AckArgs {
    stream: String,
    group: String,
    ids: Vec<String>,
}

/// Tool for removing processed entries from a group's pending list
pub struct GroupAckTool {
    coordinator: Arc<Coordinator>,
}

impl GroupAckTool {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl Tool for GroupAckTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "group_ack",
            "Acknowledge processed entries. Unknown or already acknowledged IDs are ignored.",
            json!({
                "type": "object",
                "properties": {
                    "stream": name_schema("Stream name"),
                    "group": name_schema("Consumer group name"),
                    "ids": ids_schema("Entry IDs to acknowledge")
                },
                "required": ["stream", "group", "ids"]
            }),
        )
    }

    async fn execute(&self, params: Value) -> ToolResult<Value> {
        let args: AckArgs = parse_args(params)?;
        let ids = parse_ids(&args.ids)?;

        let acknowledged = self
            .coordinator
            .acknowledge(&args.stream, &args.group, &ids)
            .await?;
        Ok(json!({
            "stream": args.stream,
            "group": args.group,
            "requested": ids.len(),
            "acknowledged": acknowledged
        }))
    }
}
