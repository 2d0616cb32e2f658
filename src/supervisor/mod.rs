//! Resilience Supervisor
//!
//! Owns the process [`Lifecycle`], restores the store session after a loss
//! with capped exponential [`Backoff`], turns SIGINT/SIGTERM into a drain
//! and runs the shutdown sequence.

mod backoff;
mod lifecycle;

pub use backoff::Backoff;
pub use lifecycle::{Lifecycle, LifecycleState};

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::SupervisorConfig;
use crate::connection::{ConnectionManager, ConnectionState};

pub struct Supervisor {
    lifecycle: Lifecycle,
    connection: Option<Arc<ConnectionManager>>,
    config: SupervisorConfig,
}

impl Supervisor {
    /// `connection` is `None` for backends without a network session
    pub fn new(
        lifecycle: Lifecycle,
        connection: Option<Arc<ConnectionManager>>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            lifecycle,
            connection,
            config,
        }
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Start the reconnect loop for the store session
    pub fn spawn_reconnect(&self) -> Option<JoinHandle<()>> {
        let connection = self.connection.clone()?;
        let lifecycle = self.lifecycle.clone();
        let backoff = Backoff::from_config(&self.config);
        Some(tokio::spawn(reconnect_loop(connection, lifecycle, backoff)))
    }

    /// Start draining on the first SIGINT or SIGTERM
    pub fn spawn_signal_listener(&self) -> JoinHandle<()> {
        let lifecycle = self.lifecycle.clone();
        tokio::spawn(async move {
            match wait_for_signal().await {
                Ok(signal) => {
                    info!(signal, "shutdown requested, draining");
                    lifecycle.begin_drain();
                }
                Err(err) => error!(error = %err, "could not install signal handlers"),
            }
        })
    }

    /// Close the store connection and mark the process stopped.
    ///
    /// Call after the transport has drained.
    pub async fn shutdown(&self) {
        self.lifecycle.begin_drain();
        if let Some(connection) = &self.connection {
            connection.close(self.config.drain_timeout).await;
        }
        self.lifecycle.stop();
        info!("stopped");
    }
}

async fn reconnect_loop(
    connection: Arc<ConnectionManager>,
    lifecycle: Lifecycle,
    mut backoff: Backoff,
) {
    let mut states: watch::Receiver<ConnectionState> = connection.subscribe();
    loop {
        let state = *states.borrow_and_update();
        match state {
            ConnectionState::Lost => {
                if !restore(&connection, &lifecycle, &mut backoff).await {
                    return;
                }
            }
            ConnectionState::Closing | ConnectionState::Closed => return,
            _ => {}
        }

        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    return;
                }
            }
            _ = lifecycle.draining() => return,
        }
    }
}

/// Retry until connected. False when the process started draining first.
async fn restore(
    connection: &ConnectionManager,
    lifecycle: &Lifecycle,
    backoff: &mut Backoff,
) -> bool {
    loop {
        if !lifecycle.is_running() {
            return false;
        }
        let delay = backoff.next_delay();
        warn!(
            endpoint = connection.endpoint(),
            attempt = backoff.attempts(),
            delay_ms = delay.as_millis() as u64,
            "store connection lost, reconnecting"
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = lifecycle.draining() => return false,
        }

        match connection.connect().await {
            Ok(()) => {
                info!(
                    endpoint = connection.endpoint(),
                    attempts = backoff.attempts(),
                    "store connection restored"
                );
                backoff.reset();
                return true;
            }
            Err(err) if err.is_connection() => {
                debug!(error = %err, "reconnect attempt failed");
            }
            Err(err) => {
                debug!(error = %err, "reconnect abandoned");
                return false;
            }
        }
    }
}

async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            Ok("SIGINT")
        }
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}
