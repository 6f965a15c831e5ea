//! Turns a classified failure into the modal shown to the user.

use std::error::Error;

use serde_json::Value;

use crate::error::ErrorClassification;
use crate::i18n::LocalizedMessage;
use crate::modal::{Modal, ModalButton, ModalWidget};

/// Shown when a failing task has no game attached.
pub const MISSING_GAME_TITLE: &str = "<missing game>";

/// The message value put in the modal, or `None` when nothing is shown.
///
/// A single reason is used as is and several become a list. Raw text is
/// cut to its first line.
pub fn error_message(classification: &ErrorClassification) -> Option<Value> {
    match classification {
        ErrorClassification::Aborted => None,
        ErrorClassification::Reasoned(reason) => {
            let value = match reason.as_slice() {
                [single] => serde_json::to_value(single),
                many => serde_json::to_value(many),
            };
            Some(value.unwrap_or(Value::Null))
        }
        ErrorClassification::Raw(text) => {
            Some(Value::String(text.lines().next().unwrap_or_default().to_string()))
        }
    }
}

/// Localization id prefix for a failed task (`game.install.could_not_<name>`).
pub fn failure_key(task_name: &str) -> String {
    format!("game.install.could_not_{task_name}")
}

/// Builds the failure modal. `None` for aborted work.
pub fn failure_modal(
    task_name: &str,
    game_title: Option<&str>,
    classification: &ErrorClassification,
    error_stack: String,
    log: String,
) -> Option<Modal> {
    let error_message = error_message(classification)?;
    let title = game_title
        .filter(|t| !t.is_empty())
        .unwrap_or(MISSING_GAME_TITLE);
    let key = failure_key(task_name);

    let mut modal = Modal::new(
        LocalizedMessage::id(key.clone()).with("title", title),
        LocalizedMessage::id(format!("{key}.message"))
            .with("title", title)
            .with("errorMessage", error_message),
    );
    modal.detail = Some(LocalizedMessage::id(format!("{key}.detail")));
    modal.buttons = vec![
        ModalButton::new(LocalizedMessage::id("prompt.action.ok")),
        ModalButton::cancel(),
    ];
    modal.widget = Some(ModalWidget::ShowError { error_stack, log });
    Some(modal)
}

/// Full diagnostic text: the error, then each cause on its own line.
pub fn diagnostic(err: &(dyn Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str("\ncaused by: ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::TaskError;

    #[test]
    fn aborted_has_no_message_or_modal() {
        assert!(error_message(&ErrorClassification::Aborted).is_none());
        assert!(
            failure_modal(
                "launch",
                Some("Overland"),
                &ErrorClassification::Aborted,
                String::new(),
                String::new()
            )
            .is_none()
        );
    }

    #[test]
    fn raw_message_is_first_line_only() {
        let raw = ErrorClassification::Raw("engine error 1: bad\ncaused by: x\ncaused by: y".into());
        assert_eq!(error_message(&raw), Some(json!("engine error 1: bad")));
    }

    #[test]
    fn single_reason_wins_over_text() {
        let reasoned = ErrorClassification::Reasoned(vec![
            LocalizedMessage::id("errors.offline").with("host", "itch.io"),
        ]);
        assert_eq!(
            error_message(&reasoned),
            Some(json!(["errors.offline", {"host": "itch.io"}]))
        );
    }

    #[test]
    fn several_reasons_become_a_list() {
        let reasoned = ErrorClassification::Reasoned(vec![
            LocalizedMessage::id("a"),
            LocalizedMessage::literal("b"),
        ]);
        assert_eq!(error_message(&reasoned), Some(json!([["a"], "b"])));
    }

    #[test]
    fn launch_failure_modal_content() {
        let modal = failure_modal(
            "launch",
            Some("Overland"),
            &ErrorClassification::Raw("exit code 1\nstack".into()),
            "exit code 1\nstack".into(),
            "log text".into(),
        )
        .unwrap();

        let value = serde_json::to_value(&modal).unwrap();
        assert_eq!(
            value["title"],
            json!(["game.install.could_not_launch", {"title": "Overland"}])
        );
        assert_eq!(
            value["message"],
            json!(["game.install.could_not_launch.message", {"title": "Overland", "errorMessage": "exit code 1"}])
        );
        assert_eq!(value["detail"], json!(["game.install.could_not_launch.detail"]));
        assert_eq!(value["buttons"][0]["label"], json!(["prompt.action.ok"]));
        assert!(modal.buttons[1].is_cancel());
        assert_eq!(value["widget"], "show-error");
        assert_eq!(value["widgetParams"]["errorStack"], "exit code 1\nstack");
        assert_eq!(value["widgetParams"]["log"], "log text");
    }

    #[test]
    fn other_task_names_and_missing_title() {
        let modal = failure_modal(
            "uninstall",
            None,
            &ErrorClassification::Raw("nope".into()),
            String::new(),
            String::new(),
        )
        .unwrap();
        assert_eq!(modal.title.key(), Some("game.install.could_not_uninstall"));
        assert_eq!(modal.title.value("title"), Some(&json!(MISSING_GAME_TITLE)));
    }

    #[test]
    fn diagnostic_includes_causes() {
        let err = TaskError::from(hearth_engine::EngineError::Spawn {
            path: "/opt/butler".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        });
        let text = diagnostic(&err);
        assert_eq!(text, "failed to start engine /opt/butler\ncaused by: no such file");
        assert_eq!(text.matches("no such file").count(), 1);
    }
}
