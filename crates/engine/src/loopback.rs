//! In-process scripted engine for tests.
//!
//! [`pair`] wires a [`Client`] to an [`EnginePeer`] over an in-memory pipe.
//! [`LoopbackLauncher`] plugs the same thing into a
//! [`SessionManager`](crate::SessionManager) and counts spawns, releases and
//! calls so tests can assert on session lifecycle.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::{SinkExt, StreamExt};
use hearth_protocol::{Envelope, Incoming, RpcError, RpcRequest};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};

use crate::client::Client;
use crate::error::EngineError;
use crate::logger::Logger;
use crate::session::{EngineHandle, EngineLauncher, EngineSession};

const PIPE_CAPACITY: usize = 64 * 1024;
const FLUSH_METHOD: &str = "Loopback.Flush";

/// A request received by the peer.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerRequest {
    pub id: Value,
    pub method: String,
    pub params: Value,
}

/// Engine side of a loopback pipe.
pub struct EnginePeer {
    read: FramedRead<ReadHalf<DuplexStream>, LinesCodec>,
    write: FramedWrite<WriteHalf<DuplexStream>, LinesCodec>,
}

/// Creates a connected client and engine peer.
pub fn pair() -> (Client, EnginePeer) {
    let (client_io, engine_io) = tokio::io::duplex(PIPE_CAPACITY);
    let (client_read, client_write) = tokio::io::split(client_io);
    let (engine_read, engine_write) = tokio::io::split(engine_io);

    let client = Client::new(client_read, client_write);
    let peer = EnginePeer {
        read: FramedRead::new(engine_read, LinesCodec::new()),
        write: FramedWrite::new(engine_write, LinesCodec::new()),
    };
    (client, peer)
}

impl EnginePeer {
    /// Waits for the next request from the client. `None` once it is gone.
    ///
    /// Responses and notifications from the client are skipped.
    pub async fn next_request(&mut self) -> Option<PeerRequest> {
        while let Some(Ok(line)) = self.read.next().await {
            let Ok(envelope) = Envelope::from_line(&line) else {
                continue;
            };
            if let Ok(Incoming::Request { id, method, params }) = envelope.classify() {
                let params = match params {
                    Some(raw) => serde_json::from_str(raw.get()).unwrap_or(Value::Null),
                    None => Value::Null,
                };
                return Some(PeerRequest { id, method, params });
            }
        }
        None
    }

    pub async fn respond(&mut self, request: &PeerRequest, result: Value) {
        if let Ok(envelope) = Envelope::response(request.id.clone(), &result) {
            self.send(envelope).await;
        }
    }

    pub async fn respond_error(&mut self, request: &PeerRequest, error: RpcError) {
        self.send(Envelope::error_response(request.id.clone(), error))
            .await;
    }

    pub async fn notify(&mut self, method: &str, params: Value) {
        if let Ok(envelope) = Envelope::notification(method, &params) {
            self.send(envelope).await;
        }
    }

    /// Round-trips one request so everything sent before it has been
    /// handled by `client`.
    pub async fn sync(&mut self, client: &Client) {
        let call = tokio::spawn({
            let client = client.clone();
            async move { client.call(&Flush {}).await }
        });
        while let Some(request) = self.next_request().await {
            if request.method == FLUSH_METHOD {
                self.respond(&request, Value::Null).await;
                break;
            }
        }
        let _ = call.await;
    }

    /// Answers requests with `script` until the client disconnects.
    pub fn serve(mut self, script: Script) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(request) = self.next_request().await {
                if request.method == FLUSH_METHOD {
                    self.respond(&request, Value::Null).await;
                    continue;
                }
                let reply = script(&request.method, request.params.clone());
                for (method, params) in reply.notifications {
                    self.notify(&method, params).await;
                }
                match reply.outcome {
                    Some(Ok(result)) => self.respond(&request, result).await,
                    Some(Err(error)) => self.respond_error(&request, error).await,
                    None => {}
                }
            }
        })
    }

    async fn send(&mut self, envelope: Envelope) {
        if let Ok(line) = envelope.to_line() {
            let _ = self.write.send(line).await;
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Flush {}

impl RpcRequest for Flush {
    const METHOD: &'static str = FLUSH_METHOD;
    type Response = Value;
}

/// How the scripted engine answers one request.
#[derive(Debug, Clone, Default)]
pub struct Reply {
    /// Sent before the outcome, in order.
    pub notifications: Vec<(String, Value)>,
    /// `None` leaves the request unanswered.
    pub outcome: Option<Result<Value, RpcError>>,
}

impl Reply {
    pub fn ok(result: Value) -> Self {
        Self {
            notifications: Vec::new(),
            outcome: Some(Ok(result)),
        }
    }

    pub fn err(code: i64, message: impl Into<String>) -> Self {
        Self {
            notifications: Vec::new(),
            outcome: Some(Err(RpcError::new(code, message))),
        }
    }

    /// Never answers.
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn notify(mut self, method: &str, params: Value) -> Self {
        self.notifications.push((method.to_string(), params));
        self
    }
}

/// Maps `(method, params)` to a reply.
pub type Script = Arc<dyn Fn(&str, Value) -> Reply + Send + Sync>;

/// Counters shared by a launcher and its handles.
#[derive(Debug, Default)]
pub struct LoopbackStats {
    pub spawned: AtomicUsize,
    pub cancelled: AtomicUsize,
    calls: Mutex<Vec<(String, Value)>>,
}

impl LoopbackStats {
    /// Methods called so far, in order, across all sessions.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(m, _)| m.clone())
            .collect()
    }

    /// Params of every call to `method`.
    pub fn params_of(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }

    /// Number of sessions started and not yet released.
    pub fn live(&self) -> usize {
        self.spawned.load(Ordering::SeqCst) - self.cancelled.load(Ordering::SeqCst)
    }
}

/// Launcher that runs a scripted engine per session instead of a process.
pub struct LoopbackLauncher {
    script: Script,
    stats: Arc<LoopbackStats>,
    fail_spawn: bool,
    fail_ready: bool,
}

impl LoopbackLauncher {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&str, Value) -> Reply + Send + Sync + 'static,
    {
        Self {
            script: Arc::new(script),
            stats: Arc::new(LoopbackStats::default()),
            fail_spawn: false,
            fail_ready: false,
        }
    }

    /// Every spawn fails as if the executable were missing.
    pub fn failing_spawn(mut self) -> Self {
        self.fail_spawn = true;
        self
    }

    /// Processes start but never announce a client.
    pub fn failing_ready(mut self) -> Self {
        self.fail_ready = true;
        self
    }

    pub fn stats(&self) -> &Arc<LoopbackStats> {
        &self.stats
    }
}

impl EngineLauncher for LoopbackLauncher {
    fn spawn(
        &self,
        session: &EngineSession,
        logger: &Logger,
    ) -> Result<Box<dyn EngineHandle>, EngineError> {
        if self.fail_spawn {
            return Err(EngineError::Spawn {
                path: session.executable().to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            });
        }
        self.stats.spawned.fetch_add(1, Ordering::SeqCst);
        logger.debug(format!("loopback session {}", session.id()));

        let (client, peer) = pair();
        let stats = self.stats.clone();
        let script = self.script.clone();
        let recording: Script = Arc::new(move |method: &str, params: Value| {
            stats
                .calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((method.to_string(), params.clone()));
            script(method, params)
        });
        let server = peer.serve(recording);

        Ok(Box::new(LoopbackHandle {
            client,
            server,
            stats: self.stats.clone(),
            fail_ready: self.fail_ready,
            delivered: false,
        }))
    }
}

struct LoopbackHandle {
    client: Client,
    server: JoinHandle<()>,
    stats: Arc<LoopbackStats>,
    fail_ready: bool,
    delivered: bool,
}

impl EngineHandle for LoopbackHandle {
    fn client(&mut self) -> Pin<Box<dyn Future<Output = Result<Client, EngineError>> + Send + '_>> {
        Box::pin(async move {
            if self.fail_ready {
                return Err(EngineError::Startup("engine exited before it was ready".into()));
            }
            if self.delivered {
                return Err(EngineError::ClientTaken);
            }
            self.delivered = true;
            Ok(self.client.clone())
        })
    }

    fn cancel(&mut self) {
        self.stats.cancelled.fetch_add(1, Ordering::SeqCst);
        self.client.close();
        self.server.abort();
    }
}
