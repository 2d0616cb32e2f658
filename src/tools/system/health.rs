//! Bus health tool

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::connection::ConnectionManager;
use crate::coordinator::Coordinator;
use crate::protocol::{Tool, ToolDefinition, ToolResult};
use crate::supervisor::Lifecycle;

/// Tool reporting store connectivity and process lifecycle.
///
/// Never fails: an unreachable store is reported as data, not as an error.
pub struct BusHealthTool {
    coordinator: Arc<Coordinator>,
    connection: Option<Arc<ConnectionManager>>,
    lifecycle: Lifecycle,
}

impl BusHealthTool {
    pub fn new(
        coordinator: Arc<Coordinator>,
        connection: Option<Arc<ConnectionManager>>,
        lifecycle: Lifecycle,
    ) -> Self {
        Self {
            coordinator,
            connection,
            lifecycle,
        }
    }
}

#[async_trait]
impl Tool for BusHealthTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "bus_health",
            "Report store connection state, commands in flight, lifecycle state and this server's consumer identity",
            json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        )
    }

    async fn execute(&self, _params: Value) -> ToolResult<Value> {
        let store = match &self.connection {
            Some(connection) => json!({
                "backend": "redis",
                "endpoint": connection.endpoint(),
                "state": connection.state(),
                "in_flight": connection.in_flight()
            }),
            None => json!({
                "backend": "memory",
                "state": "connected",
                "in_flight": 0
            }),
        };

        Ok(json!({
            "store": store,
            "lifecycle": self.lifecycle.state(),
            "consumer": self.coordinator.consumer(),
            "auto_create_streams": self.coordinator.auto_create_streams()
        }))
    }
}
