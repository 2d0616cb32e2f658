//! Socket-activated transport: one session per accepted connection

use std::os::unix::io::{FromRawFd, IntoRawFd, RawFd};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, UnixListener};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::session::serve_session;
use super::TransportResult;
use crate::server::Gateway;
use crate::supervisor::Lifecycle;

const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

type Reader = Box<dyn AsyncRead + Unpin + Send>;
type Writer = Box<dyn AsyncWrite + Unpin + Send>;

/// An inherited listening socket
#[derive(Debug)]
pub enum ActivatedListener {
    Tcp(TcpListener),
    Unix(UnixListener),
}

impl ActivatedListener {
    /// Adopt an inherited descriptor, TCP or Unix.
    ///
    /// Must be called inside a tokio runtime, at most once per descriptor.
    pub fn from_fd(fd: RawFd) -> TransportResult<Self> {
        // SAFETY: the descriptor was handed to this process by its supervisor
        // and nothing else in the process owns it.
        let tcp = unsafe { std::net::TcpListener::from_raw_fd(fd) };
        if tcp.local_addr().is_ok() {
            tcp.set_nonblocking(true)?;
            return Ok(ActivatedListener::Tcp(TcpListener::from_std(tcp)?));
        }

        // Not an inet socket: take ownership back and treat it as Unix
        let fd = tcp.into_raw_fd();
        // SAFETY: ownership was just released by `into_raw_fd`.
        let unix = unsafe { std::os::unix::net::UnixListener::from_raw_fd(fd) };
        unix.set_nonblocking(true)?;
        Ok(ActivatedListener::Unix(UnixListener::from_std(unix)?))
    }

    pub fn local_description(&self) -> String {
        match self {
            ActivatedListener::Tcp(listener) => listener
                .local_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "tcp".to_string()),
            ActivatedListener::Unix(listener) => listener
                .local_addr()
                .ok()
                .and_then(|addr| addr.as_pathname().map(|p| p.display().to_string()))
                .unwrap_or_else(|| "unix".to_string()),
        }
    }

    async fn accept(&self) -> std::io::Result<(Reader, Writer, String)> {
        match self {
            ActivatedListener::Tcp(listener) => {
                let (stream, peer) = listener.accept().await?;
                let (read, write) = stream.into_split();
                Ok((Box::new(read), Box::new(write), peer.to_string()))
            }
            ActivatedListener::Unix(listener) => {
                let (stream, _peer) = listener.accept().await?;
                let (read, write) = stream.into_split();
                Ok((Box::new(read), Box::new(write), "unix peer".to_string()))
            }
        }
    }
}

/// Accept connections until draining; every connection shares `gateway`
pub async fn serve_listener(
    listener: ActivatedListener,
    gateway: Arc<Gateway>,
    lifecycle: Lifecycle,
    drain: Duration,
) -> TransportResult<()> {
    info!(listener = %listener.local_description(), "serving on activated socket");
    let mut sessions: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((reader, writer, peer)) => {
                    debug!(peer = %peer, "session opened");
                    let gateway = Arc::clone(&gateway);
                    let lifecycle = lifecycle.clone();
                    sessions.spawn(async move {
                        match serve_session(reader, writer, gateway, lifecycle, drain).await {
                            Ok(()) => debug!(peer = %peer, "session closed"),
                            Err(err) => debug!(peer = %peer, error = %err, "session ended with error"),
                        }
                    });
                }
                Err(err) => {
                    // Usually descriptor exhaustion; back off instead of spinning
                    warn!(error = %err, "accept failed");
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                }
            },
            Some(finished) = sessions.join_next(), if !sessions.is_empty() => {
                if let Err(err) = finished {
                    error!(error = %err, "session task failed");
                }
            }
            _ = lifecycle.draining() => break,
        }
    }

    // Each session drains itself; allow a little beyond its budget
    let open = sessions.len();
    let all_closed = async { while sessions.join_next().await.is_some() {} };
    if tokio::time::timeout(drain + ACCEPT_RETRY_DELAY, all_closed)
        .await
        .is_err()
    {
        warn!(open, "sessions still open after drain, aborting");
        sessions.abort_all();
    }
    Ok(())
}
