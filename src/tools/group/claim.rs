//! Claim tool for recovering entries from a failed consumer

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::coordinator::Coordinator;
use crate::protocol::{Tool, ToolDefinition, ToolResult};
use crate::tools::{ids_schema, name_schema, parse_args, parse_ids};

#[derive(Deserialize)]
struct ClaimArgs {
    stream: String,
    group: String,
    consumer: Option<String>,
    min_idle_ms: u64,
    ids: Vec<String>,
}

/// Tool for taking over pending entries idle for long enough
pub struct GroupClaimTool {
    coordinator: Arc<Coordinator>,
}

impl GroupClaimTool {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl Tool for GroupClaimTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "group_claim",
            "Reassign pending entries to a consumer. Entries delivered more recently than min_idle_ms are left alone.",
            json!({
                "type": "object",
                "properties": {
                    "stream": name_schema("Stream name"),
                    "group": name_schema("Consumer group name"),
                    "consumer": name_schema("New owner (defaults to this server's consumer)"),
                    "min_idle_ms": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "Only claim entries idle for at least this long"
                    },
                    "ids": ids_schema("Pending entry IDs to claim")
                },
                "required": ["stream", "group", "min_idle_ms", "ids"]
            }),
        )
    }

    async fn execute(&self, params: Value) -> ToolResult<Value> {
        let args: ClaimArgs = parse_args(params)?;
        let ids = parse_ids(&args.ids)?;
        let consumer = args
            .consumer
            .as_deref()
            .unwrap_or(self.coordinator.consumer());

        let claimed = self
            .coordinator
            .claim(
                &args.stream,
                &args.group,
                Some(consumer),
                Duration::from_millis(args.min_idle_ms),
                &ids,
            )
            .await?;
        Ok(json!({
            "stream": args.stream,
            "group": args.group,
            "consumer": consumer,
            "claimed": claimed
        }))
    }
}
