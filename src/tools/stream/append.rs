//! Append entry tool

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::protocol::{Tool, ToolDefinition, ToolResult};
use crate::streams::StreamStore;
use crate::tools::{name_schema, parse_args};
use crate::types::Fields;
use crate::utils::entry_time;

#[derive(Deserialize)]
struct AppendArgs {
    stream: String,
    fields: Map<String, Value>,
}

/// Tool for appending one entry to a stream
pub struct StreamAppendTool {
    store: Arc<dyn StreamStore>,
}

impl StreamAppendTool {
    pub fn new(store: Arc<dyn StreamStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for StreamAppendTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "stream_append",
            "Append an entry to a stream. The store assigns a monotonic <ms>-<seq> ID.",
            json!({
                "type": "object",
                "properties": {
                    "stream": name_schema("Stream name; created on first append"),
                    "fields": {
                        "type": "object",
                        "minProperties": 1,
                        "additionalProperties": { "type": ["string", "number", "boolean"] },
                        "description": "Field/value pairs, kept in the given order. Numbers and booleans are stored as text."
                    }
                },
                "required": ["stream", "fields"]
            }),
        )
    }

    async fn execute(&self, params: Value) -> ToolResult<Value> {
        let args: AppendArgs = parse_args(params)?;
        let fields: Fields = args
            .fields
            .iter()
            .map(|(key, value)| (key.as_str(), field_text(value)))
            .collect();

        let id = self.store.append(&args.stream, &fields).await?;
        Ok(json!({
            "stream": args.stream,
            "id": id,
            "timestamp": entry_time(&id).map(|t| t.to_rfc3339())
        }))
    }
}

fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streams::MemoryStreams;
    use crate::types::ReadFrom;

    #[tokio::test]
    async fn test_append_keeps_field_order_and_stringifies() {
        let store = Arc::new(MemoryStreams::new());
        let tool = StreamAppendTool::new(store.clone());

        let result = tool
            .execute(json!({"stream": "jobs", "fields": {"type": "build", "priority": 2, "urgent": true}}))
            .await
            .unwrap();
        assert_eq!(result["stream"], "jobs");
        assert!(result["id"].as_str().unwrap().contains('-'));

        let read = store.read("jobs", ReadFrom::Start, 10).await.unwrap();
        let fields: Vec<(&str, &str)> = read.entries[0].fields.iter().collect();
        assert_eq!(fields, vec![("type", "build"), ("priority", "2"), ("urgent", "true")]);
    }
}
