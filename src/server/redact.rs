//! Argument summaries that are safe to log

use serde_json::{Map, Value};

const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "token",
    "credential",
    "auth",
    "api_key",
    "apikey",
    "private",
];
const MAX_STRING_CHARS: usize = 64;
const MAX_ARRAY_ITEMS: usize = 5;
const MAX_SUMMARY_CHARS: usize = 512;
const MASK: &str = "***";

/// Compact rendering of tool arguments with secrets masked and bulk trimmed
pub fn summarize(args: &Value) -> String {
    truncate(&redact(args).to_string(), MAX_SUMMARY_CHARS)
}

/// Copy of `value` with sensitive keys masked and long content shortened
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, inner) in map {
                let masked = if is_sensitive(key) {
                    Value::String(MASK.to_string())
                } else {
                    redact(inner)
                };
                out.insert(key.clone(), masked);
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            let mut out: Vec<Value> = items.iter().take(MAX_ARRAY_ITEMS).map(redact).collect();
            if items.len() > MAX_ARRAY_ITEMS {
                out.push(Value::String(format!(
                    "...(+{} more)",
                    items.len() - MAX_ARRAY_ITEMS
                )));
            }
            Value::Array(out)
        }
        Value::String(s) => Value::String(truncate(s, MAX_STRING_CHARS)),
        other => other.clone(),
    }
}

fn is_sensitive(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEYS.iter().any(|s| key.contains(s))
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sensitive_keys_are_masked_at_any_depth() {
        let args = json!({
            "stream": "jobs",
            "fields": {"user": "ana", "Auth_Token": "abc", "db_password": "hunter2"}
        });
        let redacted = redact(&args);
        assert_eq!(redacted["stream"], "jobs");
        assert_eq!(redacted["fields"]["user"], "ana");
        assert_eq!(redacted["fields"]["Auth_Token"], MASK);
        assert_eq!(redacted["fields"]["db_password"], MASK);
    }

    #[test]
    fn test_long_values_are_trimmed() {
        let long = "x".repeat(200);
        let redacted = redact(&json!({"payload": long, "ids": [1, 2, 3, 4, 5, 6, 7]}));
        assert_eq!(
            redacted["payload"].as_str().unwrap().chars().count(),
            MAX_STRING_CHARS + 1
        );
        let ids = redacted["ids"].as_array().unwrap();
        assert_eq!(ids.len(), MAX_ARRAY_ITEMS + 1);
        assert_eq!(ids[MAX_ARRAY_ITEMS], "...(+2 more)");
    }

    #[test]
    fn test_summary_is_bounded() {
        let many: Vec<String> = (0..5).map(|_| "y".repeat(60)).collect();
        let mut args = serde_json::Map::new();
        for n in 0..20 {
            args.insert(format!("k{}", n), json!(many.clone()));
        }
        let summary = summarize(&Value::Object(args));
        assert!(summary.chars().count() <= MAX_SUMMARY_CHARS + 1);
    }
}
