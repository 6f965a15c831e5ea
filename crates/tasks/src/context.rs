//! Per-task context handed to task work.

use std::future::Future;
use std::sync::Arc;

use hearth_engine::{Logger, ProgressSink};
use hearth_protocol::{GameId, ProgressParams};
use tokio_util::sync::CancellationToken;

use crate::dispatch::{Action, Dispatch};
use crate::error::TaskError;

/// What a running task can see and do.
#[derive(Clone)]
pub struct TaskContext {
    name: &'static str,
    game_id: GameId,
    logger: Logger,
    cancel: CancellationToken,
    dispatch: Arc<dyn Dispatch>,
}

impl TaskContext {
    pub(crate) fn new(
        name: &'static str,
        game_id: GameId,
        logger: Logger,
        cancel: CancellationToken,
        dispatch: Arc<dyn Dispatch>,
    ) -> Self {
        Self {
            name,
            game_id,
            logger,
            cancel,
            dispatch,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn dispatch(&self, action: Action) {
        self.dispatch.dispatch(action);
    }

    pub fn is_aborted(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the task is aborted.
    pub async fn aborted(&self) {
        self.cancel.cancelled().await
    }

    /// Runs `fut` unless the task is aborted first.
    ///
    /// Aborting drops `fut`, so anything it holds (an engine session) is
    /// released before this returns [`TaskError::Aborted`].
    pub async fn abortable<T, F>(&self, fut: F) -> Result<T, TaskError>
    where
        F: Future<Output = Result<T, TaskError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TaskError::Aborted),
            result = fut => result,
        }
    }

    /// Sink that reports engine progress as `task-progress` actions.
    pub fn progress_sink(&self) -> Arc<dyn ProgressSink> {
        Arc::new(TaskProgress {
            name: self.name,
            game_id: self.game_id,
            dispatch: self.dispatch.clone(),
        })
    }
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("name", &self.name)
            .field("game_id", &self.game_id)
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

struct TaskProgress {
    name: &'static str,
    game_id: GameId,
    dispatch: Arc<dyn Dispatch>,
}

impl ProgressSink for TaskProgress {
    fn emit(&self, progress: ProgressParams) {
        self.dispatch.dispatch(Action::TaskProgress {
            name: self.name.to_string(),
            game_id: self.game_id,
            progress,
        });
    }
}
