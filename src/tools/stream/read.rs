//! Plain (non-group) read tool

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::protocol::{Tool, ToolDefinition, ToolResult};
use crate::streams::StreamStore;
use crate::tools::{count_schema, name_schema, parse_args};
use crate::types::ReadFrom;

const DEFAULT_COUNT: usize = 100;

#[derive(Deserialize)]
struct ReadArgs {
    stream: String,
    #[serde(default = "default_from")]
    from: String,
    #[serde(default = "default_count")]
    count: usize,
}

fn default_from() -> String {
    "start".to_string()
}

fn default_count() -> usize {
    DEFAULT_COUNT
}

/// Tool for reading a stream without a consumer group
pub struct StreamReadTool {
    store: Arc<dyn StreamStore>,
}

impl StreamReadTool {
    pub fn new(store: Arc<dyn StreamStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for StreamReadTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "stream_read",
            "Read entries in ID order. A missing stream reads as empty. Poll with the returned cursor as 'from'.",
            json!({
                "type": "object",
                "properties": {
                    "stream": name_schema("Stream name"),
                    "from": {
                        "type": "string",
                        "default": "start",
                        "description": "'start' for the beginning, 'end' for only newer entries, or an entry ID to read after"
                    },
                    "count": count_schema("Maximum entries to return", DEFAULT_COUNT)
                },
                "required": ["stream"]
            }),
        )
    }

    async fn execute(&self, params: Value) -> ToolResult<Value> {
        let args: ReadArgs = parse_args(params)?;
        let from: ReadFrom = args.from.parse()?;

        let result = self.store.read(&args.stream, from, args.count).await?;
        Ok(json!({
            "stream": args.stream,
            "entries": result.entries,
            "cursor": result.cursor
        }))
    }
}
