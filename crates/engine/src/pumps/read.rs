//! Read pump: routes incoming lines to pending calls and subscribers.

use futures_util::{Stream, StreamExt};
use hearth_protocol::constants::RPC_METHOD_NOT_FOUND;
use hearth_protocol::{Envelope, Incoming, RpcError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::client::{Handlers, Pending};

/// Reads lines until the transport ends or the client is cancelled.
///
/// On exit the token is cancelled and every pending call is failed by
/// dropping its sender, so callers observe a closed connection.
pub(crate) async fn read_pump<S, E>(
    mut read: S,
    pending: Pending,
    handlers: Handlers,
    write_tx: mpsc::Sender<String>,
    cancel: CancellationToken,
) where
    S: Stream<Item = Result<String, E>> + Unpin,
    E: std::fmt::Display,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            line = read.next() => {
                match line {
                    Some(Ok(line)) => handle_line(&line, &pending, &handlers, &write_tx).await,
                    Some(Err(e)) => {
                        warn!("engine read error: {e}");
                        break;
                    }
                    None => {
                        debug!("engine stream ended");
                        break;
                    }
                }
            }
        }
    }

    cancel.cancel();
    pending.lock().await.clear();
}

async fn handle_line(
    line: &str,
    pending: &Pending,
    handlers: &Handlers,
    write_tx: &mpsc::Sender<String>,
) {
    if line.trim().is_empty() {
        return;
    }

    let incoming = match Envelope::from_line(line).and_then(Envelope::classify) {
        Ok(incoming) => incoming,
        Err(e) => {
            warn!("dropping malformed engine line: {e}");
            return;
        }
    };

    match incoming {
        Incoming::Response { id, outcome } => {
            trace!(id, "received response");
            match pending.lock().await.remove(&id) {
                Some(tx) => {
                    let _ = tx.send(outcome);
                }
                None => warn!(id, "response for unknown request"),
            }
        }
        Incoming::Notification { method, params } => {
            trace!(%method, "received notification");
            // Handlers run without the table lock so they may subscribe or dispose.
            let matching = handlers.matching(&method);
            if matching.is_empty() {
                trace!(%method, "no subscriber for notification");
            }
            for handler in matching {
                handler(params.as_deref());
            }
        }
        Incoming::Request { id, method, .. } => {
            debug!(%method, "engine request has no handler");
            let reply = Envelope::error_response(
                id,
                RpcError::new(RPC_METHOD_NOT_FOUND, format!("method not found: {method}")),
            );
            match reply.to_line() {
                Ok(line) => {
                    let _ = write_tx.send(line).await;
                }
                Err(e) => warn!("failed to encode error reply: {e}"),
            }
        }
    }
}
