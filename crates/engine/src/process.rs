//! Engine processes started with `tokio::process`.
//!
//! The engine prints JSON lines on stdout: log lines, then a listen
//! notification carrying a TCP address and a secret. The client connects to
//! that address and authenticates with the secret before it is handed out.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use hearth_protocol::EngineLine;
use hearth_protocol::constants::MAX_LINE_LENGTH;
use hearth_protocol::messages::MetaAuthenticate;
use tokio::net::TcpStream;
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::Client;
use crate::error::EngineError;
use crate::logger::Logger;
use crate::router::route_log;
use crate::session::{EngineHandle, EngineLauncher, EngineSession};

/// Starts the engine as a child process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

impl EngineLauncher for ProcessLauncher {
    fn spawn(
        &self,
        session: &EngineSession,
        logger: &Logger,
    ) -> Result<Box<dyn EngineHandle>, EngineError> {
        let mut child = Command::new(session.executable())
            .args(session.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::Spawn {
                path: session.executable().to_path_buf(),
                source,
            })?;

        debug!(pid = ?child.id(), session = session.id(), "engine process started");

        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();
        if let Some(stderr) = child.stderr.take() {
            let lines = FramedRead::new(stderr, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
            let logger = logger.clone();
            tasks.push(tokio::spawn(forward_lines(
                lines,
                cancel.clone(),
                move |line| logger.warn(line),
            )));
        }

        Ok(Box::new(ProcessHandle {
            stdout: child.stdout.take(),
            child,
            logger: logger.clone(),
            startup_timeout: session.startup_timeout(),
            cancel,
            client: None,
            delivered: false,
            tasks,
        }))
    }
}

struct ProcessHandle {
    child: Child,
    stdout: Option<ChildStdout>,
    logger: Logger,
    startup_timeout: Duration,
    cancel: CancellationToken,
    client: Option<Client>,
    delivered: bool,
    tasks: Vec<JoinHandle<()>>,
}

impl ProcessHandle {
    async fn connect(&mut self) -> Result<Client, EngineError> {
        if self.delivered {
            return Err(EngineError::ClientTaken);
        }
        self.delivered = true;

        let stdout = self
            .stdout
            .take()
            .ok_or_else(|| EngineError::Startup("engine stdout is not captured".into()))?;
        let mut lines = FramedRead::new(stdout, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

        let timeout = self.startup_timeout;
        let (secret, address) =
            tokio::time::timeout(timeout, wait_for_listen(&mut lines, &self.logger))
                .await
                .map_err(|_| EngineError::StartupTimeout(timeout))??;

        // Later stdout lines are only logs.
        let logger = self.logger.clone();
        self.tasks.push(tokio::spawn(forward_lines(
            lines,
            self.cancel.clone(),
            move |line| {
                handle_stdout_line(&logger, &line);
            },
        )));

        debug!(%address, "connecting to engine");
        let stream = TcpStream::connect(&address).await?;
        let (reader, writer) = stream.into_split();
        let client = Client::new(reader, writer);
        self.client = Some(client.clone());

        let auth = client.call(&MetaAuthenticate { secret }).await?;
        if !auth.ok {
            return Err(EngineError::Startup("engine rejected the session secret".into()));
        }

        self.logger.debug(format!("engine ready on {address}"));
        Ok(client)
    }
}

impl EngineHandle for ProcessHandle {
    fn client(&mut self) -> Pin<Box<dyn Future<Output = Result<Client, EngineError>> + Send + '_>> {
        Box::pin(self.connect())
    }

    fn cancel(&mut self) {
        self.cancel.cancel();
        if let Some(client) = self.client.take() {
            client.close();
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Err(e) = self.child.start_kill() {
            // Already exited.
            debug!("engine kill: {e}");
        }
    }
}

/// Reads stdout until the engine announces where it listens.
///
/// Returns `(secret, address)`.
async fn wait_for_listen<S, E>(lines: &mut S, logger: &Logger) -> Result<(String, String), EngineError>
where
    S: Stream<Item = Result<String, E>> + Unpin,
    E: std::fmt::Display,
{
    while let Some(line) = lines.next().await {
        let line = line.map_err(|e| EngineError::Startup(format!("reading engine output: {e}")))?;
        if let Some(ready) = handle_stdout_line(logger, &line) {
            return Ok(ready);
        }
    }
    Err(EngineError::Startup("engine exited before it was ready".into()))
}

/// Logs one stdout line; returns the listen info if the line carries it.
fn handle_stdout_line(logger: &Logger, line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<EngineLine>(line) {
        Ok(EngineLine::ListenNotification { secret, tcp }) => Some((secret, tcp.address)),
        Ok(EngineLine::Log { level, message }) => {
            route_log(logger, &level, &message);
            None
        }
        Ok(EngineLine::Other) => None,
        Err(_) => {
            logger.debug(line);
            None
        }
    }
}

async fn forward_lines<S, E, F>(mut lines: S, cancel: CancellationToken, mut sink: F)
where
    S: Stream<Item = Result<String, E>> + Unpin,
    F: FnMut(String),
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next() => match line {
                Some(Ok(line)) => sink(line),
                _ => break,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::stream;

    use super::*;
    use crate::logger::Level;
    use crate::session::{EngineConfig, SessionManager};

    fn lines(items: &[&str]) -> impl Stream<Item = Result<String, std::io::Error>> + Unpin {
        stream::iter(
            items
                .iter()
                .map(|s| Ok(s.to_string()))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn waits_for_listen_and_routes_logs() {
        let logger = Logger::capturing("engine");
        let mut stdout = lines(&[
            "plain text banner",
            r#"{"type":"log","level":"warning","message":"old database"}"#,
            r#"{"type":"butlerd/listen-notification","secret":"s3cr3t","tcp":{"address":"127.0.0.1:4000"}}"#,
            r#"{"type":"log","level":"info","message":"not consumed"}"#,
        ]);

        let (secret, address) = wait_for_listen(&mut stdout, &logger).await.unwrap();
        assert_eq!(secret, "s3cr3t");
        assert_eq!(address, "127.0.0.1:4000");

        let records = logger.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].level, Level::Debug);
        assert_eq!(records[0].message, "plain text banner");
        assert_eq!(records[1].level, Level::Warn);
        assert_eq!(records[1].message, "old database");

        // The remaining line is left for the forwarder.
        assert!(stdout.next().await.is_some());
    }

    #[tokio::test]
    async fn stdout_end_before_listen_is_a_startup_error() {
        let logger = Logger::new("engine");
        let mut stdout = lines(&[r#"{"type":"log","level":"error","message":"no db"}"#]);
        let err = wait_for_listen(&mut stdout, &logger).await.unwrap_err();
        assert!(matches!(err, EngineError::Startup(_)));
    }

    #[tokio::test]
    async fn missing_executable_fails_to_spawn() {
        let mgr = SessionManager::with_process(EngineConfig::new(
            "/nonexistent/hearth/engine-binary",
            "/tmp/butler.db",
        ));
        let err = mgr
            .with_client(&Logger::new("test"), |_c| async { Ok::<(), EngineError>(()) })
            .await
            .unwrap_err();
        match err {
            EngineError::Spawn { path, .. } => {
                assert_eq!(path, std::path::PathBuf::from("/nonexistent/hearth/engine-binary"))
            }
            other => panic!("expected spawn error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    mod unix {
        use std::os::unix::fs::PermissionsExt;
        use std::path::PathBuf;

        use futures_util::SinkExt;
        use hearth_protocol::{Envelope, Incoming};
        use tokio::net::TcpListener;
        use tokio_util::codec::Framed;

        use super::*;

        /// Fake engine: the `--dbpath` value doubles as the listen address.
        fn script(dir: &tempfile::TempDir, body: &str) -> PathBuf {
            let path = dir.path().join("engine.sh");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn connects_and_authenticates() {
            let dir = tempfile::tempdir().unwrap();
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let address = listener.local_addr().unwrap().to_string();
            let exe = script(
                &dir,
                r#"echo '{"type":"log","level":"info","message":"booting"}'
echo "{\"type\":\"butlerd/listen-notification\",\"secret\":\"abc\",\"tcp\":{\"address\":\"$4\"}}"
sleep 30"#,
            );

            let engine = tokio::spawn(async move {
                let (socket, _) = listener.accept().await.unwrap();
                let mut framed = Framed::new(socket, LinesCodec::new());
                let line = framed.next().await.unwrap().unwrap();
                let Incoming::Request { id, method, params } =
                    Envelope::from_line(&line).unwrap().classify().unwrap()
                else {
                    panic!("expected request");
                };
                assert_eq!(method, "Meta.Authenticate");
                assert_eq!(params.unwrap().get(), r#"{"secret":"abc"}"#);
                let reply = Envelope::response(id, &serde_json::json!({"ok": true})).unwrap();
                framed.send(reply.to_line().unwrap()).await.unwrap();
                // Hold the socket until the client goes away.
                let _ = framed.next().await;
            });

            let mgr = SessionManager::with_process(EngineConfig::new(exe, address));
            let logger = Logger::capturing("test");
            mgr.with_client(&logger, |client| async move {
                assert!(!client.is_closed());
                Ok::<(), EngineError>(())
            })
            .await
            .unwrap();

            assert!(logger.records().iter().any(|r| r.message == "booting"));
            engine.await.unwrap();
        }

        #[tokio::test]
        async fn silent_engine_times_out() {
            let dir = tempfile::tempdir().unwrap();
            let exe = script(&dir, "sleep 30");

            let mut config = EngineConfig::new(exe, "/tmp/unused.db");
            config.startup_timeout = Duration::from_millis(200);
            let mgr = SessionManager::with_process(config);

            let err = mgr
                .with_client(&Logger::new("test"), |_c| async { Ok::<(), EngineError>(()) })
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::StartupTimeout(_)));
        }

        #[tokio::test]
        async fn early_exit_is_a_startup_error() {
            let dir = tempfile::tempdir().unwrap();
            let exe = script(&dir, "echo 'fatal: no database' >&2\nexit 1");

            let mgr = SessionManager::with_process(EngineConfig::new(exe, "/tmp/unused.db"));
            let err = mgr
                .with_client(&Logger::new("test"), |_c| async { Ok::<(), EngineError>(()) })
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::Startup(_)));
        }
    }
}
