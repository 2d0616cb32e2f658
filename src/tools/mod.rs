//! Tools exposed through the gateway
//!
//! Organized by category:
//! - Stream tools (3): append, plain read, stream listing
//! - Group tools (6): consumer group creation, reads, acks and recovery
//! - System tools (2): bus health and current time

pub mod group;
pub mod stream;
pub mod system;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::connection::ConnectionManager;
use crate::coordinator::Coordinator;
use crate::protocol::{ToolError, ToolResult};
use crate::server::{RegistryError, ToolRegistry};
use crate::streams::MAX_COUNT;
use crate::supervisor::Lifecycle;
use crate::types::EntryId;

pub use group::{
    GroupAckTool, GroupClaimTool, GroupCreateTool, GroupListTool, GroupPendingTool, GroupReadTool,
};
pub use stream::{StreamAppendTool, StreamListTool, StreamReadTool};
pub use system::{BusHealthTool, GetCurrentTimeTool};

/// Register every tool with the registry
pub fn register_all_tools(
    registry: &mut ToolRegistry,
    coordinator: Arc<Coordinator>,
    connection: Option<Arc<ConnectionManager>>,
    lifecycle: Lifecycle,
) -> Result<(), RegistryError> {
    let store = Arc::clone(coordinator.store());

    // Stream tools (3)
    registry.register(Arc::new(StreamAppendTool::new(store.clone())))?;
    registry.register(Arc::new(StreamReadTool::new(store.clone())))?;
    registry.register(Arc::new(StreamListTool::new(store)))?;

    // Group tools (6)
    registry.register(Arc::new(GroupCreateTool::new(coordinator.clone())))?;
    registry.register(Arc::new(GroupReadTool::new(coordinator.clone())))?;
    registry.register(Arc::new(GroupAckTool::new(coordinator.clone())))?;
    registry.register(Arc::new(GroupListTool::new(coordinator.clone())))?;
    registry.register(Arc::new(GroupPendingTool::new(coordinator.clone())))?;
    registry.register(Arc::new(GroupClaimTool::new(coordinator.clone())))?;

    // System tools (2)
    registry.register(Arc::new(BusHealthTool::new(coordinator, connection, lifecycle)))?;
    registry.register(Arc::new(GetCurrentTimeTool::new()))?;

    Ok(())
}

/// Decode validated arguments into a handler's typed contract
pub(crate) fn parse_args<T: DeserializeOwned>(params: Value) -> ToolResult<T> {
    serde_json::from_value(params).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

pub(crate) fn parse_ids(ids: &[String]) -> ToolResult<Vec<EntryId>> {
    ids.iter()
        .map(|id| {
            id.parse::<EntryId>()
                .map_err(|e| ToolError::InvalidArguments(e.to_string()))
        })
        .collect()
}

/// Schema fragment shared by every `count` argument
pub(crate) fn count_schema(description: &str, default: usize) -> Value {
    json!({
        "type": "integer",
        "minimum": 1,
        "maximum": MAX_COUNT,
        "default": default,
        "description": description
    })
}

pub(crate) fn name_schema(description: &str) -> Value {
    json!({
        "type": "string",
        "minLength": 1,
        "description": description
    })
}

pub(crate) fn ids_schema(description: &str) -> Value {
    json!({
        "type": "array",
        "minItems": 1,
        "items": { "type": "string", "pattern": "^[0-9]+(-[0-9]+)?$" },
        "description": description
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streams::MemoryStreams;

    #[test]
    fn test_all_tools_register_with_valid_schemas() {
        let coordinator = Arc::new(Coordinator::new(Arc::new(MemoryStreams::new()), "w1"));
        let mut registry = ToolRegistry::new();
        register_all_tools(&mut registry, coordinator, None, Lifecycle::new()).unwrap();
        assert_eq!(registry.len(), 11);

        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        for expected in ["stream_append", "group_create", "group_claim", "bus_health", "get_current_time"] {
            assert!(names.iter().any(|n| n == expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_parse_ids_rejects_malformed() {
        let ids = parse_ids(&["1-1".to_string(), "7".to_string()]).unwrap();
        assert_eq!(ids, vec![EntryId::new(1, 1), EntryId::new(7, 0)]);
        assert!(parse_ids(&["nope".to_string()]).is_err());

        let overflow = parse_ids(&["18446744073709551616-0".to_string()]).unwrap_err();
        assert!(overflow.is_invalid_arguments());
    }
}
