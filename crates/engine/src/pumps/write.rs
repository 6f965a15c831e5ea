//! Write pump: serialises outbound lines onto the transport.

use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Writes lines to the transport until cancelled or every sender is gone.
pub(crate) async fn write_pump<S, E>(
    mut write: S,
    mut write_rx: mpsc::Receiver<String>,
    cancel: CancellationToken,
) where
    S: SinkExt<String, Error = E> + Unpin,
    E: std::fmt::Display,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            line = write_rx.recv() => {
                match line {
                    Some(line) => {
                        if let Err(e) = write.send(line).await {
                            error!("engine write error: {e}");
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    debug!("engine write pump stopped");
    let _ = write.close().await;
}
