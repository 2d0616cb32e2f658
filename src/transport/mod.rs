//! Transport Adapter
//!
//! Two interchangeable transports share one [`Gateway`]: a duplex pipe over
//! stdin/stdout, and a listening socket handed over by a process supervisor
//! (`LISTEN_FDS`), where each accepted connection gets its own session.

mod activation;
mod session;
mod socket;
mod stdio;

pub use activation::{listen_fd, ENV_LISTEN_FDS, ENV_LISTEN_PID, LISTEN_FDS_START};
pub use session::serve_session;
pub use socket::{serve_listener, ActivatedListener};
pub use stdio::serve_stdio;

use std::os::unix::io::RawFd;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::server::Gateway;
use crate::supervisor::Lifecycle;

pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket activation: {0}")]
    Activation(String),

    #[error("response writer failed: {0}")]
    Writer(String),
}

/// Which transport this process serves on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stdio,
    Socket(RawFd),
}

impl Transport {
    /// Socket activation when the environment hands us a listener, stdio otherwise
    pub fn detect() -> TransportResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok(), std::process::id())
    }

    pub fn from_lookup<F>(lookup: F, pid: u32) -> TransportResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(match listen_fd(lookup, pid)? {
            Some(fd) => Transport::Socket(fd),
            None => Transport::Stdio,
        })
    }

    /// Serve until the peer goes away (stdio) or the lifecycle drains
    pub async fn serve(
        self,
        gateway: Arc<Gateway>,
        lifecycle: Lifecycle,
        drain: Duration,
    ) -> TransportResult<()> {
        match self {
            Transport::Stdio => serve_stdio(gateway, lifecycle, drain).await,
            Transport::Socket(fd) => {
                let listener = ActivatedListener::from_fd(fd)?;
                serve_listener(listener, gateway, lifecycle, drain).await
            }
        }
    }
}
