//! Stream Bus MCP Server - Binary Entry Point
//!
//! Configuration comes from `STREAM_BUS_*` environment variables. Logs go to
//! stderr; stdout belongs to the stdio transport.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use stream_bus::config::{Backend, BusConfig};
use stream_bus::connection::ConnectionManager;
use stream_bus::coordinator::Coordinator;
use stream_bus::protocol::ServerInfo;
use stream_bus::server::{Gateway, ToolRegistry};
use stream_bus::streams::{MemoryStreams, RedisStreams, StreamStore};
use stream_bus::supervisor::{Lifecycle, Supervisor};
use stream_bus::tools::register_all_tools;
use stream_bus::transport::Transport;

const EXIT_CONFIG: u8 = 2;

// A blocked stdin read must not hold the process open after shutdown
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

fn main() -> ExitCode {
    init_tracing();

    let config = match BusConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid configuration");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "could not start the async runtime");
            return ExitCode::FAILURE;
        }
    };
    let code = runtime.block_on(run(config));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
    code
}

async fn run(config: BusConfig) -> ExitCode {
    let (store, connection): (Arc<dyn StreamStore>, Option<Arc<ConnectionManager>>) =
        match &config.backend {
            Backend::Redis(store_config) => {
                let connection = match ConnectionManager::new(store_config) {
                    Ok(connection) => Arc::new(connection),
                    Err(err) => {
                        error!(error = %err, "invalid store settings");
                        return ExitCode::from(EXIT_CONFIG);
                    }
                };
                if let Err(err) = connection.connect().await {
                    // Not fatal: the supervisor keeps retrying
                    warn!(error = %err, "store unreachable at startup");
                }
                let store: Arc<dyn StreamStore> = Arc::new(RedisStreams::new(connection.clone()));
                (store, Some(connection))
            }
            Backend::Memory => {
                info!("using the in-memory store");
                let store: Arc<dyn StreamStore> = Arc::new(MemoryStreams::new());
                (store, None)
            }
        };

    let transport = match Transport::detect() {
        Ok(transport) => transport,
        Err(err) => {
            error!(error = %err, "invalid socket activation environment");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let lifecycle = Lifecycle::new();
    let supervisor = Supervisor::new(
        lifecycle.clone(),
        connection.clone(),
        config.supervisor.clone(),
    );
    let reconnect = supervisor.spawn_reconnect();
    let signals = supervisor.spawn_signal_listener();

    let coordinator = Arc::new(
        Coordinator::new(store, config.consumer.consumer.clone())
            .with_auto_create(config.consumer.auto_create_streams),
    );
    if let Some(group) = &config.consumer.group {
        let established = coordinator
            .bootstrap(&config.consumer.streams, group)
            .await;
        info!(
            group = %group,
            established,
            configured = config.consumer.streams.len(),
            "consumer groups bootstrapped"
        );
    }

    let mut registry = ToolRegistry::new();
    if let Err(err) = register_all_tools(&mut registry, coordinator, connection, lifecycle.clone())
    {
        error!(error = %err, "tool registration failed");
        return ExitCode::FAILURE;
    }
    let server_info = ServerInfo::new(config.server_name.clone(), stream_bus::VERSION.to_string());
    let gateway = Arc::new(Gateway::new(server_info, registry));

    info!(
        server = %config.server_name,
        consumer = %config.consumer.consumer,
        tools = gateway.tool_count(),
        transport = ?transport,
        "stream bus server starting"
    );

    let served = transport
        .serve(gateway, lifecycle, config.supervisor.drain_timeout)
        .await;

    supervisor.shutdown().await;
    signals.abort();
    if let Some(reconnect) = reconnect {
        reconnect.abort();
    }

    match served {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "transport failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
