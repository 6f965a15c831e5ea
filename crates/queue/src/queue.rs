//! Deciding whether a requested game is installed, launched or needs a
//! choice from the user.

use std::sync::Arc;

use hearth_engine::{Logger, SessionManager, attach};
use hearth_protocol::messages::{FetchCavesByGameId, Launch};
use hearth_protocol::{
    Cave, CaveLocation, Credentials, Game, GameCredentials, GameId, PathScheme, Upload,
};
use hearth_tasks::{
    Action, Dispatch, LocalizedMessage, Modal, ModalButton, QueueDownload, Task, TaskContext,
    TaskError, TaskOutcome, TaskRunner,
};
use tracing::info;

use crate::error::QueueError;
use crate::install_folder::{install_folder_name, reserve_install_folder};
use crate::store::CaveStore;
use crate::types::{Preferences, Runtime};
use crate::upload_button::cave_button;

/// What [`GameQueue::queue_game`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueDecision {
    /// No installation existed; a download was queued into this location.
    Install(CaveLocation),
    /// Exactly one installation existed and was queued for launch.
    Launch(Cave),
    /// Several existed; the user picked one (queued for launch) or none.
    Prompted { chosen: Option<Cave> },
}

/// The install/launch decision engine.
pub struct GameQueue {
    sessions: Arc<SessionManager>,
    tasks: Arc<TaskRunner>,
    store: Arc<dyn CaveStore>,
    prefs: Preferences,
    runtime: Runtime,
    credentials: Option<Credentials>,
    logger: Logger,
}

impl GameQueue {
    pub fn new(
        sessions: Arc<SessionManager>,
        tasks: Arc<TaskRunner>,
        store: Arc<dyn CaveStore>,
        prefs: Preferences,
        logger: Logger,
    ) -> Self {
        Self {
            sessions,
            tasks,
            store,
            prefs,
            runtime: Runtime::current(),
            credentials: None,
            logger: logger.child("queue-game"),
        }
    }

    /// Credentials attached to queued downloads.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_runtime(mut self, runtime: Runtime) -> Self {
        self.runtime = runtime;
        self
    }

    fn dispatcher(&self) -> &Arc<dyn Dispatch> {
        self.tasks.dispatcher()
    }

    /// Lists the game's installations. Always asks the engine.
    pub async fn fetch_caves(&self, game_id: GameId) -> Result<Vec<Cave>, QueueError> {
        let result = self
            .sessions
            .with_client(&self.logger, |client| async move {
                client.call(&FetchCavesByGameId { game_id }).await
            })
            .await?;
        Ok(result.caves)
    }

    /// Installs, launches or asks, depending on how many caves the game has.
    pub async fn queue_game(&self, game: &Game) -> Result<QueueDecision, QueueError> {
        let mut caves = self.fetch_caves(game.id).await?;

        match caves.len() {
            0 => {
                info!(game_id = game.id, "no cave, queueing install");
                self.logger
                    .info(format!("No cave for {} (#{}), attempting install", game.title, game.id));
                let location = self.queue_install(game, None).await?;
                Ok(QueueDecision::Install(location))
            }
            1 => {
                let cave = caves.remove(0);
                self.dispatcher().dispatch(Action::QueueLaunch { cave: cave.clone() });
                Ok(QueueDecision::Launch(cave))
            }
            n => {
                self.logger
                    .info(format!("Have {n} caves for game {} (#{})", game.title, game.id));
                let chosen = self.prompt_for_cave(game, caves).await;
                Ok(QueueDecision::Prompted { chosen })
            }
        }
    }

    /// Skips the cave lookup and installs `upload` into a new cave.
    pub async fn queue_game_install(
        &self,
        game: &Game,
        upload: Option<Upload>,
    ) -> Result<CaveLocation, QueueError> {
        self.queue_install(game, upload).await
    }

    async fn prompt_for_cave(&self, game: &Game, caves: Vec<Cave>) -> Option<Cave> {
        let mut modal = Modal::new(
            LocalizedMessage::id("prompt.launch.title").with("title", game.title.clone()),
            LocalizedMessage::id("prompt.launch.message"),
        );
        modal.big_buttons = caves
            .into_iter()
            .map(|cave| cave_button(&cave).with_action(Action::QueueLaunch { cave }))
            .collect();
        modal.buttons = vec![ModalButton::cancel()];

        let response = self.dispatcher().prompt(modal.clone()).await;
        let action = modal.action_for(&response).cloned()?;
        let chosen = match &action {
            Action::QueueLaunch { cave } => Some(cave.clone()),
            _ => None,
        };
        self.dispatcher().dispatch(action);
        chosen
    }

    async fn queue_install(
        &self,
        game: &Game,
        upload: Option<Upload>,
    ) -> Result<CaveLocation, QueueError> {
        let mut cave = Cave {
            id: uuid::Uuid::new_v4().to_string(),
            game: game.clone(),
            upload: upload.clone(),
            install_location: self.prefs.default_install_location.clone(),
            install_folder: install_folder_name(game),
            path_scheme: PathScheme::ModernShared,
        };
        reserve_install_folder(self.store.as_ref(), &self.prefs, &mut cave).await?;
        let location = CaveLocation {
            id: cave.id,
            install_location: cave.install_location,
            install_folder: cave.install_folder,
            path_scheme: cave.path_scheme,
        };

        let credentials = self
            .credentials
            .as_ref()
            .map(|c| GameCredentials::new(c, self.prefs.api_server.clone()));
        self.dispatcher()
            .dispatch(Action::QueueDownload(QueueDownload::install(
                game.clone(),
                upload,
                location.clone(),
                credentials,
            )));

        self.logger.info(format!(
            "Queued install of {} into {}/{}",
            game.title, location.install_location, location.install_folder
        ));
        Ok(location)
    }

    /// Launches a cave as the `launch` task and waits for the game to exit.
    ///
    /// Failures are presented by the task wrapper; aborts are silent.
    pub async fn queue_launch(&self, cave: Cave) -> TaskOutcome {
        let sessions = self.sessions.clone();
        let request = Launch {
            cave_id: cave.id.clone(),
            prereqs_dir: self.prefs.prereqs_dir.display().to_string(),
            sandbox: self.runtime.sandbox(&self.prefs),
        };
        let title = cave.game.title.clone();

        let task = Task::new("launch", cave.game.id, move |ctx: TaskContext, logger: Logger| async move {
            logger.info(format!("Launching cave {}", request.cave_id));
            let sink = ctx.progress_sink();
            let routing_logger = logger.clone();
            let run = sessions.with_client(&logger, move |client| async move {
                let _routing = attach(&client, &routing_logger, sink);
                client.call(&request).await?;
                Ok::<(), TaskError>(())
            });
            ctx.abortable(run).await?;
            logger.info("Game exited");
            Ok::<(), TaskError>(())
        })
        .game_title(title);

        self.tasks.run(task).await
    }

    /// Aborts running launches for a game.
    pub fn abort(&self, game_id: GameId) -> usize {
        self.tasks.abort(game_id)
    }
}
