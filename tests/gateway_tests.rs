//! Integration tests for the dispatch gateway over the full tool set

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use stream_bus::config::StoreConfig;
use stream_bus::protocol::{Tool, ToolDefinition, ToolError, ToolResult};
use stream_bus::server::STORE_UNAVAILABLE;
use stream_bus::streams::{MemoryStreams, RedisStreams};
use stream_bus::tools::register_all_tools;
use stream_bus::{ConnectionManager, Coordinator, Gateway, Lifecycle, ServerInfo, ToolRegistry};

struct ExplodingTool;

#[async_trait]
impl Tool for ExplodingTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("explode", "Always panics", json!({"type": "object"}))
    }

    async fn execute(&self, _params: Value) -> ToolResult<Value> {
        panic!("handler bug");
    }
}

struct RefusingTool;

#[async_trait]
impl Tool for RefusingTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("refuse", "Always fails", json!({"type": "object"}))
    }

    async fn execute(&self, _params: Value) -> ToolResult<Value> {
        Err(ToolError::Failed("quota exceeded".to_string()))
    }
}

fn memory_gateway(auto_create: bool) -> Gateway {
    let coordinator = Arc::new(
        Coordinator::new(Arc::new(MemoryStreams::new()), "consumer-test")
            .with_auto_create(auto_create),
    );
    let mut registry = ToolRegistry::new();
    register_all_tools(&mut registry, coordinator, None, Lifecycle::new()).unwrap();
    registry.register(Arc::new(ExplodingTool)).unwrap();
    registry.register(Arc::new(RefusingTool)).unwrap();
    Gateway::new(ServerInfo::default(), registry)
}

async fn request(gateway: &Gateway, message: Value) -> Value {
    let reply = gateway
        .handle_message(&message.to_string())
        .await
        .expect("request should get a reply");
    serde_json::from_str(&reply).unwrap()
}

async fn call(gateway: &Gateway, id: u64, name: &str, arguments: Value) -> Value {
    request(
        gateway,
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "call_tool",
            "params": {"name": name, "arguments": arguments}
        }),
    )
    .await
}

/// Structured result of a successful tool call
fn structured(reply: &Value) -> &Value {
    assert_eq!(reply["result"]["isError"], false, "unexpected failure: {}", reply);
    &reply["result"]["structuredContent"]
}

fn is_entry_id(id: &str) -> bool {
    match id.split_once('-') {
        Some((ms, seq)) => {
            !ms.is_empty()
                && !seq.is_empty()
                && ms.chars().all(|c| c.is_ascii_digit())
                && seq.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

#[tokio::test]
async fn test_health_watchers_scenario() {
    let gw = memory_gateway(true);

    let appended = call(&gw, 1, "stream_append", json!({"stream": "health", "fields": {"type": "ping"}})).await;
    let id = structured(&appended)["id"].as_str().unwrap().to_string();
    assert!(is_entry_id(&id), "unexpected id {}", id);

    let first = call(&gw, 2, "group_create", json!({"stream": "health", "group": "watchers"})).await;
    assert_eq!(structured(&first)["created"], true);
    assert!(structured(&first).get("note").is_none());

    let second = call(&gw, 3, "group_create", json!({"stream": "health", "group": "watchers"})).await;
    assert_eq!(structured(&second)["created"], false);
    assert_eq!(structured(&second)["note"], "already existed");

    let read = call(
        &gw,
        4,
        "group_read",
        json!({"stream": "health", "group": "watchers", "consumer": "w1", "count": 1}),
    )
    .await;
    let entries = structured(&read)["entries"].as_array().unwrap().clone();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["id"], id.as_str());
    assert_eq!(entries[0]["fields"]["type"], "ping");

    let pending = call(&gw, 5, "group_pending", json!({"stream": "health", "group": "watchers"})).await;
    assert_eq!(structured(&pending)["summary"]["count"], 1);

    let acked = call(&gw, 6, "group_ack", json!({"stream": "health", "group": "watchers", "ids": [id]})).await;
    assert_eq!(structured(&acked)["acknowledged"], 1);

    let pending = call(&gw, 7, "group_pending", json!({"stream": "health", "group": "watchers"})).await;
    assert_eq!(structured(&pending)["summary"]["count"], 0);

    let groups = call(&gw, 8, "group_list", json!({"stream": "health"})).await;
    assert_eq!(structured(&groups)["groups"][0]["name"], "watchers");
    assert_eq!(structured(&groups)["groups"][0]["pending"], 0);

    // Acknowledging again is a no-op
    let again = call(&gw, 9, "group_ack", json!({"stream": "health", "group": "watchers", "ids": [id]})).await;
    assert_eq!(structured(&again)["acknowledged"], 0);
}

#[tokio::test]
async fn test_unacknowledged_entries_can_be_recovered() {
    let gw = memory_gateway(true);
    call(&gw, 1, "stream_append", json!({"stream": "jobs", "fields": {"n": "1"}})).await;

    let read = call(&gw, 2, "group_read", json!({"stream": "jobs", "group": "g", "consumer": "crashed"})).await;
    let id = structured(&read)["entries"][0]["id"].as_str().unwrap().to_string();

    // Nothing new for another consumer
    let other = call(&gw, 3, "group_read", json!({"stream": "jobs", "group": "g", "consumer": "w2"})).await;
    assert_eq!(structured(&other)["entries"], json!([]));

    // The owner can re-read its pending entry
    let reread = call(
        &gw,
        4,
        "group_read",
        json!({"stream": "jobs", "group": "g", "consumer": "crashed", "pending": true}),
    )
    .await;
    assert_eq!(structured(&reread)["entries"][0]["id"], id.as_str());

    let detail = call(&gw, 5, "group_pending", json!({"stream": "jobs", "group": "g", "detail": true})).await;
    assert_eq!(structured(&detail)["entries"][0]["consumer"], "crashed");

    let claimed = call(
        &gw,
        6,
        "group_claim",
        json!({"stream": "jobs", "group": "g", "consumer": "w2", "min_idle_ms": 0, "ids": [id]}),
    )
    .await;
    assert_eq!(structured(&claimed)["claimed"][0]["id"], id.as_str());

    let detail = call(&gw, 7, "group_pending", json!({"stream": "jobs", "group": "g", "detail": true})).await;
    assert_eq!(structured(&detail)["entries"][0]["consumer"], "w2");
    assert_eq!(structured(&detail)["entries"][0]["deliveries"], 2);
}

#[tokio::test]
async fn test_plain_reads_follow_id_order() {
    let gw = memory_gateway(true);
    for n in 0..3 {
        call(&gw, n, "stream_append", json!({"stream": "orders", "fields": {"n": n}})).await;
    }

    let read = call(&gw, 10, "stream_read", json!({"stream": "orders", "count": 2})).await;
    let page = structured(&read);
    assert_eq!(page["entries"].as_array().unwrap().len(), 2);
    assert_eq!(page["entries"][0]["fields"]["n"], "0");
    let cursor = page["cursor"].as_str().unwrap().to_string();

    let rest = call(&gw, 11, "stream_read", json!({"stream": "orders", "from": cursor})).await;
    let rest = structured(&rest)["entries"].as_array().unwrap().clone();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0]["fields"]["n"], "2");

    let missing = call(&gw, 12, "stream_read", json!({"stream": "nope"})).await;
    assert_eq!(structured(&missing)["entries"], json!([]));

    let listed = call(&gw, 13, "stream_list", json!({"pattern": "ord*"})).await;
    assert_eq!(structured(&listed)["streams"][0]["name"], "orders");
    assert_eq!(structured(&listed)["streams"][0]["length"], 3);
}

#[tokio::test]
async fn test_tail_read_of_missing_stream_can_be_polled() {
    let gw = memory_gateway(true);
    let tail = call(&gw, 1, "stream_read", json!({"stream": "fresh", "from": "end"})).await;
    assert_eq!(structured(&tail)["entries"], json!([]));
    let cursor = structured(&tail)["cursor"].as_str().unwrap().to_string();
    assert_eq!(cursor, "0-0");

    call(&gw, 2, "stream_append", json!({"stream": "fresh", "fields": {"k": "first"}})).await;

    let polled = call(&gw, 3, "stream_read", json!({"stream": "fresh", "from": cursor})).await;
    let entries = structured(&polled)["entries"].as_array().unwrap().clone();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["fields"]["k"], "first");
}

#[tokio::test]
async fn test_unknown_tool_is_method_not_found() {
    let gw = memory_gateway(true);
    let reply = call(&gw, 1, "does_not_exist", json!({})).await;
    assert_eq!(reply["id"], 1);
    assert_eq!(reply["error"]["code"], -32601);
    assert!(reply.get("result").is_none());

    // Still serving
    let reply = call(&gw, 2, "get_current_time", json!({})).await;
    assert!(structured(&reply)["timestamp"].is_i64());
}

#[tokio::test]
async fn test_schema_violations_are_rejected_before_the_handler() {
    let gw = memory_gateway(true);

    let cases = [
        ("stream_append", json!({"stream": "s"})),
        ("stream_append", json!({"stream": "s", "fields": {}})),
        ("stream_read", json!({"stream": "s", "count": 0})),
        ("stream_read", json!({"stream": "s", "count": 1001})),
        ("group_ack", json!({"stream": "s", "group": "g", "ids": []})),
        ("group_claim", json!({"stream": "s", "group": "g", "ids": ["1-1"]})),
    ];
    for (n, (tool, arguments)) in cases.into_iter().enumerate() {
        let reply = call(&gw, n as u64, tool, arguments).await;
        assert_eq!(reply["error"]["code"], -32602, "{} accepted bad input", tool);
    }

    // Nothing was written by the rejected appends
    let read = call(&gw, 99, "stream_read", json!({"stream": "s"})).await;
    assert_eq!(structured(&read)["entries"], json!([]));
}

#[tokio::test]
async fn test_failing_handler_does_not_break_later_calls() {
    let gw = memory_gateway(true);

    let boom = call(&gw, 1, "explode", json!({})).await;
    assert_eq!(boom["id"], 1);
    assert_eq!(boom["result"]["isError"], true);

    let refused = call(&gw, 2, "refuse", json!({})).await;
    assert_eq!(refused["result"]["isError"], true);
    assert_eq!(refused["result"]["content"][0]["text"], "Error: quota exceeded");

    let ok = call(&gw, 3, "stream_append", json!({"stream": "after", "fields": {"k": "v"}})).await;
    assert!(structured(&ok)["id"].is_string());
}

#[tokio::test]
async fn test_store_errors_surface_as_tool_errors() {
    let gw = memory_gateway(false);
    let reply = call(&gw, 1, "group_read", json!({"stream": "missing", "group": "g"})).await;
    assert_eq!(reply["result"]["isError"], true);
}

#[tokio::test]
async fn test_undecodable_ids_are_invalid_params() {
    let gw = memory_gateway(true);

    let bad_from = call(&gw, 1, "stream_read", json!({"stream": "s", "from": "not-an-id"})).await;
    assert_eq!(bad_from["error"]["code"], -32602);
    assert_eq!(bad_from["error"]["data"]["tool"], "stream_read");

    // Matches the schema pattern but does not fit in 64 bits
    let overflow = call(
        &gw,
        2,
        "group_ack",
        json!({"stream": "s", "group": "g", "ids": ["18446744073709551616-0"]}),
    )
    .await;
    assert_eq!(overflow["id"], 2);
    assert_eq!(overflow["error"]["code"], -32602);
    assert!(overflow.get("result").is_none());
}

#[tokio::test]
async fn test_connection_failures_are_masked() {
    let mut config = StoreConfig::new("127.0.0.1", 1);
    config.connect_timeout = Duration::from_millis(200);
    config.command_wait = Duration::from_millis(50);
    let connection = Arc::new(ConnectionManager::new(&config).unwrap());
    let coordinator = Arc::new(Coordinator::new(
        Arc::new(RedisStreams::new(connection.clone())),
        "w1",
    ));

    let mut registry = ToolRegistry::new();
    register_all_tools(&mut registry, coordinator, Some(connection), Lifecycle::new()).unwrap();
    let gw = Gateway::new(ServerInfo::default(), registry);

    let reply = call(&gw, 1, "stream_append", json!({"stream": "s", "fields": {"k": "v"}})).await;
    assert_eq!(reply["result"]["isError"], true);
    assert_eq!(
        reply["result"]["content"][0]["text"],
        format!("Error: {}", STORE_UNAVAILABLE)
    );

    let health = call(&gw, 2, "bus_health", json!({})).await;
    assert_eq!(structured(&health)["store"]["state"], "lost");
}

#[tokio::test]
async fn test_list_tools_is_derived_from_the_registry() {
    let gw = memory_gateway(true);
    let reply = request(&gw, json!({"jsonrpc": "2.0", "id": "t", "method": "tools/list"})).await;
    let tools = reply["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 13);
    assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));

    let legacy = request(&gw, json!({"id": 5, "method": "list_tools"})).await;
    assert_eq!(legacy["result"]["tools"].as_array().unwrap().len(), 13);
}
