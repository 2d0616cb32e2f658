//! Group read tool

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::coordinator::Coordinator;
use crate::protocol::{Tool, ToolDefinition, ToolResult};
use crate::tools::{count_schema, name_schema, parse_args};
use crate::types::GroupRead;

const DEFAULT_COUNT: usize = 10;

#[derive(Deserialize)]
struct ReadArgs {
    stream: String,
    group: String,
    consumer: Option<String>,
    #[serde(default = "default_count")]
    count: usize,
    #[serde(default)]
    pending: bool,
    #[serde(default = "default_after")]
    after: String,
}

fn default_count() -> usize {
    DEFAULT_COUNT
}

fn default_after() -> String {
    "0-0".to_string()
}

/// Tool for reading entries as one consumer of a group
pub struct GroupReadTool {
    coordinator: Arc<Coordinator>,
}

impl GroupReadTool {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl Tool for GroupReadTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "group_read",
            "Read entries never delivered to any consumer of the group. Delivered entries stay pending until acknowledged. With pending=true, re-read this consumer's own pending entries instead.",
            json!({
                "type": "object",
                "properties": {
                    "stream": name_schema("Stream name"),
                    "group": name_schema("Consumer group name"),
                    "consumer": name_schema("Consumer identity, unique per worker (defaults to this server's consumer)"),
                    "count": count_schema("Maximum entries to deliver", DEFAULT_COUNT),
                    "pending": {
                        "type": "boolean",
                        "default": false,
                        "description": "Re-read pending entries after 'after' instead of new ones"
                    },
                    "after": {
                        "type": "string",
                        "default": "0-0",
                        "description": "Entry ID to re-read pending entries after"
                    }
                },
                "required": ["stream", "group"]
            }),
        )
    }

    async fn execute(&self, params: Value) -> ToolResult<Value> {
        let args: ReadArgs = parse_args(params)?;
        let read = if args.pending {
            GroupRead::Pending(args.after.parse()?)
        } else {
            GroupRead::New
        };
        let consumer = args
            .consumer
            .as_deref()
            .unwrap_or(self.coordinator.consumer());

        let entries = self
            .coordinator
            .consume(&args.stream, &args.group, Some(consumer), read, args.count)
            .await?;
        Ok(json!({
            "stream": args.stream,
            "group": args.group,
            "consumer": consumer,
            "entries": entries
        }))
    }
}
