//! Stream Bus MCP Server
//!
//! A stream message bus client with consumer-group coordination, exposed as
//! schema-validated MCP tools over newline-delimited JSON-RPC.
//!
//! # Features
//!
//! - **11 MCP Tools**: append, read and list streams; create, read, ack,
//!   inspect and claim within consumer groups; health and time
//! - **Idempotent groups**: group creation is safe to repeat on every startup
//! - **At-least-once delivery**: unacknowledged entries stay pending and can
//!   be re-read or claimed
//! - **Self-healing**: a lost store session is restored with capped backoff
//! - **Two transports**: stdio, or a socket handed over via `LISTEN_FDS`
//!
//! # Modules
//!
//! - `types`: Entries, IDs, groups and introspection snapshots
//! - `connection`: The single shared store session
//! - `streams`: Stream primitives over the store (Redis or in-memory)
//! - `coordinator`: Consumer group lifecycle
//! - `protocol`: MCP and JSON-RPC protocol types
//! - `server`: Tool registry and dispatch gateway
//! - `tools`: MCP tool implementations
//! - `transport`: stdio and socket-activated sessions
//! - `supervisor`: Lifecycle, reconnects, signals and shutdown
//! - `config`: Environment configuration
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use stream_bus::streams::MemoryStreams;
//! use stream_bus::tools::register_all_tools;
//! use stream_bus::{Coordinator, Gateway, Lifecycle, ServerInfo, ToolRegistry};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let coordinator = Arc::new(Coordinator::new(Arc::new(MemoryStreams::new()), "worker-1"));
//! let lifecycle = Lifecycle::new();
//!
//! let mut registry = ToolRegistry::new();
//! register_all_tools(&mut registry, coordinator, None, lifecycle.clone())?;
//! let gateway = Gateway::new(ServerInfo::default(), registry);
//!
//! let reply = gateway
//!     .handle_message(r#"{"jsonrpc":"2.0","id":1,"method":"list_tools"}"#)
//!     .await;
//! println!("{:?}", reply);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod coordinator;
pub mod error;
pub mod protocol;
pub mod server;
pub mod streams;
pub mod supervisor;
pub mod tools;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export commonly used items at crate root
pub use config::{Backend, BusConfig, ConfigError};
pub use connection::{ConnectionManager, ConnectionState};
pub use coordinator::{Coordinator, GroupPhase};
pub use error::{BusError, BusResult};
pub use protocol::{ServerInfo, Tool, ToolDefinition, ToolError, ToolResult};
pub use server::{Gateway, RegistryError, ToolRegistry};
pub use streams::{MemoryStreams, RedisStreams, StreamStore};
pub use supervisor::{Lifecycle, LifecycleState, Supervisor};
pub use transport::{Transport, TransportError};
pub use types::{
    Entry, EntryId, Fields, GroupCreation, GroupInfo, GroupRead, GroupStart, PendingEntry,
    PendingSummary, ReadFrom, ReadResult, StreamInfo,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
