//! Running named units of work with failure classification.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::FutureExt;
use hearth_engine::Logger;
use hearth_protocol::GameId;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::context::TaskContext;
use crate::dispatch::{Action, Dispatch, TaskOutcome};
use crate::error::{ErrorClassification, TaskError};
use crate::surface::{diagnostic, failure_modal};

type ErrorHook = Box<dyn FnOnce(&TaskError, &str) + Send>;

/// A named unit of work keyed by game.
pub struct Task<W> {
    name: &'static str,
    game_id: GameId,
    game_title: Option<String>,
    work: W,
    on_error: Option<ErrorHook>,
}

impl<W> Task<W> {
    pub fn new(name: &'static str, game_id: GameId, work: W) -> Self {
        Self {
            name,
            game_id,
            game_title: None,
            work,
            on_error: None,
        }
    }

    /// Title used in the failure modal.
    pub fn game_title(mut self, title: impl Into<String>) -> Self {
        self.game_title = Some(title.into());
        self
    }

    /// Called with the error and the task's log on any failure, aborts
    /// included.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&TaskError, &str) + Send + 'static,
    {
        self.on_error = Some(Box::new(hook));
        self
    }
}

/// Runs tasks and tracks which games have one in flight.
pub struct TaskRunner {
    dispatch: Arc<dyn Dispatch>,
    logger: Logger,
    running: Mutex<HashMap<GameId, Vec<(u64, CancellationToken)>>>,
    next_id: AtomicU64,
}

impl TaskRunner {
    pub fn new(dispatch: Arc<dyn Dispatch>, logger: Logger) -> Self {
        Self {
            dispatch,
            logger,
            running: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn dispatcher(&self) -> &Arc<dyn Dispatch> {
        &self.dispatch
    }

    /// Runs `task` to completion.
    ///
    /// The work's value is discarded. An aborted task is reported silently;
    /// any other failure is logged and shown to the user, and this waits
    /// until the modal is answered. There are no retries here.
    ///
    /// If the work panics, the task still ends as failed before the panic
    /// is resumed.
    pub async fn run<W, Fut, T>(&self, task: Task<W>) -> TaskOutcome
    where
        W: FnOnce(TaskContext, Logger) -> Fut,
        Fut: Future<Output = Result<T, TaskError>>,
    {
        let Task {
            name,
            game_id,
            game_title,
            work,
            on_error,
        } = task;

        let logger = self.logger.child(name).with_capture();
        let (token, _registration) = self.register(game_id);
        let ctx = TaskContext::new(name, game_id, logger.clone(), token.clone(), self.dispatch.clone());

        info!(task = name, game_id, "task started");
        self.dispatch.dispatch(Action::TaskStarted {
            name: name.to_string(),
            game_id,
        });

        let result = match AssertUnwindSafe(work(ctx, logger.clone())).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                error!(task = name, game_id, "task panicked");
                logger.error(format!("{name} panicked"));
                self.end(name, game_id, TaskOutcome::Failed);
                std::panic::resume_unwind(panic);
            }
        };

        let outcome = match result {
            Ok(_) => {
                debug!(task = name, game_id, "task completed");
                TaskOutcome::Completed
            }
            Err(err) => {
                let classification = if token.is_cancelled() {
                    ErrorClassification::Aborted
                } else {
                    err.classify()
                };

                let outcome = match classification {
                    ErrorClassification::Aborted => {
                        logger.info(format!("{name} aborted: {err}"));
                        TaskOutcome::Aborted
                    }
                    _ => {
                        logger.error(format!("{name} failed: {err}"));
                        TaskOutcome::Failed
                    }
                };

                let log = logger.transcript();
                if let Some(hook) = on_error {
                    hook(&err, &log);
                }

                if let Some(modal) = failure_modal(
                    name,
                    game_title.as_deref(),
                    &classification,
                    diagnostic(&err),
                    log,
                ) {
                    self.end(name, game_id, outcome);
                    self.dispatch.prompt(modal).await;
                    return outcome;
                }
                outcome
            }
        };

        self.end(name, game_id, outcome);
        outcome
    }

    /// Aborts every running task for `game_id`. Returns how many were hit.
    pub fn abort(&self, game_id: GameId) -> usize {
        let running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        let tokens = running.get(&game_id).map(Vec::as_slice).unwrap_or_default();
        for (_, token) in tokens {
            token.cancel();
        }
        if !tokens.is_empty() {
            info!(game_id, count = tokens.len(), "aborting tasks");
        }
        tokens.len()
    }

    pub fn is_running(&self, game_id: GameId) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&game_id)
            .is_some_and(|t| !t.is_empty())
    }

    fn end(&self, name: &str, game_id: GameId, outcome: TaskOutcome) {
        self.dispatch.dispatch(Action::TaskEnded {
            name: name.to_string(),
            game_id,
            outcome,
        });
    }

    fn register(&self, game_id: GameId) -> (CancellationToken, Registration<'_>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(game_id)
            .or_default()
            .push((id, token.clone()));
        (
            token,
            Registration {
                runner: self,
                game_id,
                id,
            },
        )
    }
}

/// Removes a task from the running table when it ends, however it ends.
struct Registration<'a> {
    runner: &'a TaskRunner,
    game_id: GameId,
    id: u64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let mut running = self
            .runner
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(tokens) = running.get_mut(&self.game_id) {
            tokens.retain(|(id, _)| *id != self.id);
            if tokens.is_empty() {
                running.remove(&self.game_id);
            }
        }
    }
}
