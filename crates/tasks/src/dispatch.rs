//! Actions sent to the UI/dispatch layer.

use std::future::Future;
use std::pin::Pin;

use hearth_protocol::{Cave, CaveLocation, Game, GameCredentials, GameId, ProgressParams, Upload};
use serde::Serialize;

use crate::modal::{Modal, ModalResponse};

/// Outcome reported when a task ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskOutcome {
    Completed,
    /// Stopped on purpose; nothing was shown to the user.
    Aborted,
    /// Failed; the user was shown an error.
    Failed,
}

/// Why a download is queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadReason {
    Install,
}

/// Request to download and install a game into a new cave.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueDownload {
    pub reason: DownloadReason,
    pub game: Game,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<Upload>,
    pub cave_id: String,
    pub install_location: String,
    pub install_folder: String,
    pub path_scheme: hearth_protocol::PathScheme,
    /// Never printed or logged.
    #[serde(skip)]
    pub credentials: Option<GameCredentials>,
}

impl QueueDownload {
    pub fn install(
        game: Game,
        upload: Option<Upload>,
        location: CaveLocation,
        credentials: Option<GameCredentials>,
    ) -> Self {
        Self {
            reason: DownloadReason::Install,
            game,
            upload,
            cave_id: location.id,
            install_location: location.install_location,
            install_folder: location.install_folder,
            path_scheme: location.path_scheme,
            credentials,
        }
    }
}

/// Everything the core asks the outside world to do.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
#[serde(rename_all_fields = "camelCase")]
pub enum Action {
    QueueDownload(QueueDownload),
    QueueLaunch {
        cave: Cave,
    },
    TaskStarted {
        name: String,
        game_id: GameId,
    },
    TaskProgress {
        name: String,
        game_id: GameId,
        progress: ProgressParams,
    },
    TaskEnded {
        name: String,
        game_id: GameId,
        outcome: TaskOutcome,
    },
}

/// The UI/dispatch collaborator.
pub trait Dispatch: Send + Sync {
    /// Fire-and-forget.
    fn dispatch(&self, action: Action);

    /// Shows a modal and waits for the user.
    fn prompt(&self, modal: Modal) -> Pin<Box<dyn Future<Output = ModalResponse> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use hearth_protocol::PathScheme;
    use serde_json::json;

    use super::*;

    #[test]
    fn task_events_are_tagged_kebab_case() {
        let action = Action::TaskEnded {
            name: "launch".into(),
            game_id: 9,
            outcome: TaskOutcome::Aborted,
        };
        assert_eq!(
            serde_json::to_value(&action).unwrap(),
            json!({
                "type": "task-ended",
                "payload": {"name": "launch", "gameId": 9, "outcome": "aborted"}
            })
        );
    }

    #[test]
    fn queue_download_hides_credentials() {
        let download = QueueDownload::install(
            Game::new(3, "Overland"),
            None,
            CaveLocation {
                id: "c1".into(),
                install_location: "appdata".into(),
                install_folder: "overland".into(),
                path_scheme: PathScheme::ModernShared,
            },
            Some(GameCredentials {
                api_key: "hunter2".into(),
                download_key: None,
                server: "https://itch.io/api/1".into(),
            }),
        );
        let value = serde_json::to_value(Action::QueueDownload(download)).unwrap();
        assert_eq!(value["type"], "queue-download");
        assert_eq!(value["payload"]["reason"], "install");
        assert_eq!(value["payload"]["caveId"], "c1");
        assert_eq!(value["payload"]["pathScheme"], 2);
        assert!(!value.to_string().contains("hunter2"));
    }
}
