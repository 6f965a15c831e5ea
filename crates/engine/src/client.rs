//! JSON-RPC client for a running engine.
//!
//! Lines are exchanged over any async byte stream (TCP in production, an
//! in-memory duplex in tests). Requests are correlated by numeric id;
//! notifications fan out to typed subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, Weak};

use hearth_protocol::constants::MAX_LINE_LENGTH;
use hearth_protocol::envelope::parse_params;
use hearth_protocol::{Envelope, RpcError, RpcNotification, RpcRequest};
use serde_json::value::RawValue;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::error::EngineError;

pub(crate) type Pending =
    Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Box<RawValue>, RpcError>>>>>;

pub(crate) type Handler = Arc<dyn Fn(Option<&RawValue>) + Send + Sync>;

pub(crate) type Handlers = Arc<HandlerTable>;

/// Notification subscribers, keyed by method.
#[derive(Default)]
pub(crate) struct HandlerTable {
    inner: std::sync::Mutex<HandlerEntries>,
}

#[derive(Default)]
struct HandlerEntries {
    next_id: u64,
    entries: Vec<(u64, &'static str, Handler)>,
}

impl HandlerTable {
    pub(crate) fn shared() -> Handlers {
        Arc::new(Self::default())
    }

    pub(crate) fn insert<F>(&self, method: &'static str, handler: F) -> u64
    where
        F: Fn(Option<&RawValue>) + Send + Sync + 'static,
    {
        let mut table = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        table.next_id += 1;
        let id = table.next_id;
        table.entries.push((id, method, Arc::new(handler)));
        id
    }

    pub(crate) fn remove(&self, id: u64) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .retain(|(entry, _, _)| *entry != id);
    }

    /// Snapshot of the handlers for `method`, in subscription order.
    pub(crate) fn matching(&self, method: &str) -> Vec<Handler> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .filter(|(_, m, _)| *m == method)
            .map(|(_, _, h)| h.clone())
            .collect()
    }

    fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }
}

/// Handle to one notification subscription.
///
/// The handler stays registered until this is dropped or disposed.
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    table: Weak<HandlerTable>,
    id: u64,
}

impl Subscription {
    /// Unsubscribes now.
    pub fn dispose(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(table) = self.table.upgrade() {
            table.remove(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

struct ClientInner {
    write_tx: mpsc::Sender<String>,
    pending: Pending,
    handlers: Handlers,
    next_id: AtomicU64,
    cancel: CancellationToken,
    read_handle: JoinHandle<()>,
    write_handle: JoinHandle<()>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.read_handle.abort();
        self.write_handle.abort();
    }
}

/// Connected engine client. Clones share one connection.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Starts the read and write pumps over a byte stream pair.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let read = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
        let write = FramedWrite::new(writer, LinesCodec::new());

        let (write_tx, write_rx) = mpsc::channel::<String>(256);
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let handlers = HandlerTable::shared();
        let cancel = CancellationToken::new();

        let write_handle = tokio::spawn(crate::pumps::write::write_pump(
            write,
            write_rx,
            cancel.clone(),
        ));

        let read_handle = tokio::spawn(crate::pumps::read::read_pump(
            read,
            pending.clone(),
            handlers.clone(),
            write_tx.clone(),
            cancel.clone(),
        ));

        Self {
            inner: Arc::new(ClientInner {
                write_tx,
                pending,
                handlers,
                next_id: AtomicU64::new(1),
                cancel,
                read_handle,
                write_handle,
            }),
        }
    }

    /// Sends a request and waits for the engine's answer.
    ///
    /// There is no timeout: some calls (a launch) last as long as the game
    /// runs. A closed connection fails every outstanding call.
    pub async fn call<R: RpcRequest>(&self, request: &R) -> Result<R::Response, EngineError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let line = Envelope::request(id, R::METHOD, request)?.to_line()?;

        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().await.insert(id, tx);

        // The read pump clears pending on exit; don't register after it.
        if self.inner.cancel.is_cancelled() {
            self.inner.pending.lock().await.remove(&id);
            return Err(EngineError::Closed);
        }

        trace!(id, method = R::METHOD, "sending request");
        if self.inner.write_tx.send(line).await.is_err() {
            self.inner.pending.lock().await.remove(&id);
            return Err(EngineError::Closed);
        }

        let result = rx.await;
        self.inner.pending.lock().await.remove(&id);

        match result {
            Ok(Ok(raw)) => Ok(serde_json::from_str(raw.get())?),
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(EngineError::Closed),
        }
    }

    /// Subscribes to a notification type.
    ///
    /// Payloads that don't parse as `N` are logged and skipped.
    pub fn on_notification<N, F>(&self, handler: F) -> Subscription
    where
        N: RpcNotification,
        F: Fn(N) + Send + Sync + 'static,
    {
        let id = self.inner.handlers.insert(N::METHOD, move |params| {
            match parse_params::<N>(params) {
                Ok(n) => handler(n),
                Err(e) => warn!(method = N::METHOD, "bad notification payload: {e}"),
            }
        });
        Subscription {
            table: Arc::downgrade(&self.inner.handlers),
            id,
        }
    }

    /// Stops both pumps. Outstanding and future calls fail with `Closed`.
    pub fn close(&self) {
        self.inner.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Number of live notification subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.handlers.len()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("closed", &self.is_closed())
            .finish()
    }
}
