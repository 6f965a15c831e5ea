//! Engine sessions: one process, one client, always released.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::FutureExt;
use hearth_protocol::constants::{DEFAULT_STARTUP_TIMEOUT, ENGINE_DAEMON_ARGS, ENGINE_DB_PATH_FLAG};

use crate::client::Client;
use crate::error::EngineError;
use crate::logger::Logger;
use crate::process::ProcessLauncher;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Running,
    Cancelled,
}

/// Where the engine lives and how to start it.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub executable: PathBuf,
    /// Persistent state database passed to every process.
    pub db_path: PathBuf,
    pub extra_args: Vec<String>,
    /// How long to wait for the process to announce its listen address.
    pub startup_timeout: Duration,
}

impl EngineConfig {
    pub fn new(executable: impl Into<PathBuf>, db_path: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            db_path: db_path.into(),
            extra_args: Vec::new(),
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }
}

/// Descriptor of one engine run. Building it starts nothing.
#[derive(Debug)]
pub struct EngineSession {
    id: u64,
    executable: PathBuf,
    args: Vec<String>,
    startup_timeout: Duration,
    state: SessionState,
}

/// Starts engine processes.
pub trait EngineLauncher: Send + Sync {
    /// Starts the process described by `session`.
    fn spawn(
        &self,
        session: &EngineSession,
        logger: &Logger,
    ) -> Result<Box<dyn EngineHandle>, EngineError>;
}

/// A started engine process.
pub trait EngineHandle: Send {
    /// Waits for the engine to become ready and returns its client.
    ///
    /// Succeeds at most once per handle.
    fn client(&mut self) -> Pin<Box<dyn Future<Output = Result<Client, EngineError>> + Send + '_>>;

    /// Signals the engine to stop. Called exactly once per handle.
    fn cancel(&mut self);
}

/// Cancels the handle when released or dropped, whichever comes first.
struct ReleaseGuard {
    handle: Option<Box<dyn EngineHandle>>,
}

impl ReleaseGuard {
    fn new(handle: Box<dyn EngineHandle>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    async fn client(&mut self) -> Result<Client, EngineError> {
        match self.handle.as_mut() {
            Some(handle) => handle.client().await,
            None => Err(EngineError::Closed),
        }
    }

    fn release(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.cancel();
        }
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.release();
    }
}

impl EngineSession {
    fn new(id: u64, executable: PathBuf, args: Vec<String>, startup_timeout: Duration) -> Self {
        Self {
            id,
            executable,
            args,
            startup_timeout,
            state: SessionState::NotStarted,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn executable(&self) -> &std::path::Path {
        &self.executable
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn startup_timeout(&self) -> Duration {
        self.startup_timeout
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Starts the process, hands its client to `f` once, then cancels the
    /// process whatever `f` did.
    ///
    /// Errors from `f` come back untouched after the release. A panic in `f`
    /// also releases the session before it resumes. A session runs at most
    /// once.
    pub async fn with_client<T, E, F, Fut>(
        &mut self,
        launcher: &dyn EngineLauncher,
        logger: &Logger,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce(Client) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<EngineError>,
    {
        if self.state != SessionState::NotStarted {
            return Err(EngineError::SessionReused.into());
        }

        logger.debug(format!(
            "starting {} {}",
            self.executable.display(),
            self.args.join(" ")
        ));
        let handle = match launcher.spawn(self, logger) {
            Ok(handle) => handle,
            Err(e) => {
                self.state = SessionState::Cancelled;
                return Err(e.into());
            }
        };
        self.state = SessionState::Running;

        let mut guard = ReleaseGuard::new(handle);
        let outcome = AssertUnwindSafe(async {
            let client = guard.client().await.map_err(E::from)?;
            f(client).await
        })
        .catch_unwind()
        .await;

        guard.release();
        self.state = SessionState::Cancelled;
        logger.debug("session released");

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

/// Creates one independent engine session per operation.
pub struct SessionManager {
    config: EngineConfig,
    launcher: Arc<dyn EngineLauncher>,
    next_id: AtomicU64,
}

impl SessionManager {
    pub fn new(config: EngineConfig, launcher: Arc<dyn EngineLauncher>) -> Self {
        Self {
            config,
            launcher,
            next_id: AtomicU64::new(1),
        }
    }

    /// Manager backed by real engine processes.
    pub fn with_process(config: EngineConfig) -> Self {
        Self::new(config, Arc::new(ProcessLauncher))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Builds a session descriptor: `daemon --json --dbpath <db> [extra..]`.
    pub fn create_session(&self) -> EngineSession {
        let mut args: Vec<String> = ENGINE_DAEMON_ARGS.iter().map(|s| s.to_string()).collect();
        args.push(ENGINE_DB_PATH_FLAG.to_string());
        args.push(self.config.db_path.display().to_string());
        args.extend(self.config.extra_args.iter().cloned());

        EngineSession::new(
            self.next_id.fetch_add(1, Ordering::Relaxed),
            self.config.executable.clone(),
            args,
            self.config.startup_timeout,
        )
    }

    /// Runs `f` against a fresh session; see [`EngineSession::with_client`].
    ///
    /// Engine output is logged under an `engine#<id>` child of `logger`.
    pub async fn with_client<T, E, F, Fut>(&self, logger: &Logger, f: F) -> Result<T, E>
    where
        F: FnOnce(Client) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<EngineError>,
    {
        let mut session = self.create_session();
        let logger = logger.child(&format!("engine#{}", session.id()));
        session.with_client(self.launcher.as_ref(), &logger, f).await
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
