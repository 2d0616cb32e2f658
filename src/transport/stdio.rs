//! Duplex pipe transport over the process's stdin and stdout

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::session::serve_session;
use super::TransportResult;
use crate::server::Gateway;
use crate::supervisor::Lifecycle;

/// Serve until stdin closes or the lifecycle starts draining.
///
/// stdout carries responses only; logs go to stderr.
pub async fn serve_stdio(
    gateway: Arc<Gateway>,
    lifecycle: Lifecycle,
    drain: Duration,
) -> TransportResult<()> {
    info!(tools = gateway.tool_count(), "serving on stdio");
    serve_session(
        tokio::io::stdin(),
        tokio::io::stdout(),
        gateway,
        lifecycle,
        drain,
    )
    .await
}
