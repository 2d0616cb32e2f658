//! Helpers for building `call_tool` results

use serde_json::{json, Value};

/// Extract tool arguments from params
pub fn extract_arguments(params: &Value) -> Value {
    params
        .get("arguments")
        .cloned()
        .filter(|args| !args.is_null())
        .unwrap_or_else(|| Value::Object(serde_json::Map::new()))
}

/// Extract tool name from params
pub fn extract_tool_name(params: &Value) -> Option<&str> {
    params.get("name").and_then(|v| v.as_str())
}

/// Successful tool result: a text rendering plus the structured value
pub fn text_response(value: Value) -> Value {
    let text = match &value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    json!({
        "content": [{
            "type": "text",
            "text": text
        }],
        "structuredContent": value,
        "isError": false
    })
}

/// Failed tool result. The transport stays up; only this call failed.
pub fn error_response(message: String) -> Value {
    json!({
        "content": [{
            "type": "text",
            "text": format!("Error: {}", message)
        }],
        "isError": true
    })
}
