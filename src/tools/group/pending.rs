//! Pending entries inspection tool

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::coordinator::Coordinator;
use crate::protocol::{Tool, ToolDefinition, ToolResult};
use crate::tools::{count_schema, name_schema, parse_args};

const DEFAULT_COUNT: usize = 10;

#[derive(Deserialize)]
struct PendingArgs {
    stream: String,
    group: String,
    #[serde(default)]
    detail: bool,
    #[serde(default = "default_count")]
    count: usize,
    consumer: Option<String>,
}

fn default_count() -> usize {
    DEFAULT_COUNT
}

/// Tool for inspecting delivered but unacknowledged entries
pub struct GroupPendingTool {
    coordinator: Arc<Coordinator>,
}

impl GroupPendingTool {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl Tool for GroupPendingTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "group_pending",
            "Summarize a group's pending entries per consumer. With detail=true also list the oldest ones with idle time and delivery count.",
            json!({
                "type": "object",
                "properties": {
                    "stream": name_schema("Stream name"),
                    "group": name_schema("Consumer group name"),
                    "detail": {
                        "type": "boolean",
                        "default": false,
                        "description": "Include individual pending entries"
                    },
                    "count": count_schema("Maximum pending entries to list", DEFAULT_COUNT),
                    "consumer": name_schema("Only list entries owned by this consumer")
                },
                "required": ["stream", "group"]
            }),
        )
    }

    async fn execute(&self, params: Value) -> ToolResult<Value> {
        let args: PendingArgs = parse_args(params)?;
        let summary = self
            .coordinator
            .pending_summary(&args.stream, &args.group)
            .await?;

        let mut result = json!({
            "stream": args.stream,
            "group": args.group,
            "summary": summary
        });
        if args.detail {
            let entries = self
                .coordinator
                .pending(&args.stream, &args.group, args.count, args.consumer.as_deref())
                .await?;
            result["entries"] = serde_json::to_value(entries)?;
        }
        Ok(result)
    }
}
