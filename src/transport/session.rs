//! One newline-delimited JSON-RPC session over a duplex byte stream

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use super::{TransportError, TransportResult};
use crate::server::Gateway;
use crate::supervisor::Lifecycle;

const OUTBOX_CAPACITY: usize = 64;

/// Serve requests from `reader`, writing responses to `writer`.
///
/// Requests are dispatched in the order they are parsed, each on its own
/// task, and responses are written as they complete. Callers correlate by
/// `id`. Returns when the peer closes its side or the lifecycle starts
/// draining; in-flight calls then get up to `drain` to finish.
pub async fn serve_session<R, W>(
    reader: R,
    writer: W,
    gateway: Arc<Gateway>,
    lifecycle: Lifecycle,
    drain: Duration,
) -> TransportResult<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbox, inbox) = mpsc::channel::<String>(OUTBOX_CAPACITY);
    let writer_task = tokio::spawn(write_responses(writer, inbox));

    let mut lines = BufReader::new(reader).lines();
    let mut calls: JoinSet<()> = JoinSet::new();
    let mut closed_by_peer = false;

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let gateway = Arc::clone(&gateway);
                    let outbox = outbox.clone();
                    calls.spawn(async move {
                        if let Some(reply) = gateway.handle_message(&line).await {
                            if outbox.send(reply).await.is_err() {
                                debug!("response dropped, writer has gone away");
                            }
                        }
                    });
                }
                Ok(None) => {
                    debug!("peer closed the session");
                    closed_by_peer = true;
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "failed to read request, closing session");
                    closed_by_peer = true;
                    break;
                }
            },
            Some(finished) = calls.join_next(), if !calls.is_empty() => {
                if let Err(err) = finished {
                    error!(error = %err, "request task failed");
                }
            }
            _ = lifecycle.draining() => {
                debug!("draining session");
                break;
            }
        }
    }

    // A peer that hung up still gets its outstanding answers unless we are shutting down
    if closed_by_peer {
        tokio::select! {
            _ = join_all(&mut calls) => {}
            _ = lifecycle.draining() => {}
        }
    }
    if tokio::time::timeout(drain, join_all(&mut calls)).await.is_err() {
        warn!(abandoned = calls.len(), "drain timeout reached, aborting in-flight calls");
        calls.abort_all();
        join_all(&mut calls).await;
    }

    drop(outbox);
    match writer_task.await {
        Ok(result) => result.map_err(TransportError::from),
        Err(err) => Err(TransportError::Writer(err.to_string())),
    }
}

async fn write_responses<W>(mut writer: W, mut inbox: mpsc::Receiver<String>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(reply) = inbox.recv().await {
        writer.write_all(reply.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    writer.shutdown().await.or_else(|err| {
        // stdout and some sockets refuse shutdown; the data is already flushed
        debug!(error = %err, "writer shutdown failed");
        Ok(())
    })
}

async fn join_all(calls: &mut JoinSet<()>) {
    while calls.join_next().await.is_some() {}
}
