//! Idempotent group creation tool

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::coordinator::Coordinator;
use crate::protocol::{Tool, ToolDefinition, ToolResult};
use crate::tools::{name_schema, parse_args};
use crate::types::GroupStart;

#[derive(Deserialize)]
struct CreateArgs {
    stream: String,
    group: String,
    #[serde(default = "default_start")]
    start: String,
    mkstream: Option<bool>,
}

fn default_start() -> String {
    "0".to_string()
}

/// Tool for creating a consumer group; an existing group is not an error
pub struct GroupCreateTool {
    coordinator: Arc<Coordinator>,
}

impl GroupCreateTool {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl Tool for GroupCreateTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "group_create",
            "Create a consumer group. Safe to call on every startup: an existing group returns created=false with note 'already existed'.",
            json!({
                "type": "object",
                "properties": {
                    "stream": name_schema("Stream name"),
                    "group": name_schema("Consumer group name"),
                    "start": {
                        "type": "string",
                        "default": "0",
                        "description": "'0' to deliver the whole history, '$' for new entries only, or an entry ID"
                    },
                    "mkstream": {
                        "type": "boolean",
                        "description": "Create the stream if missing (defaults to the server setting)"
                    }
                },
                "required": ["stream", "group"]
            }),
        )
    }

    async fn execute(&self, params: Value) -> ToolResult<Value> {
        let args: CreateArgs = parse_args(params)?;
        let start: GroupStart = args.start.parse()?;
        let mkstream = args
            .mkstream
            .unwrap_or_else(|| self.coordinator.auto_create_streams());

        let creation = self
            .coordinator
            .ensure_group(&args.stream, &args.group, start, mkstream)
            .await?;
        Ok(serde_json::to_value(creation)?)
    }
}
