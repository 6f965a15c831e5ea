//! Modal dialogs requested from the UI layer.

use serde::Serialize;

use crate::dispatch::Action;
use crate::i18n::LocalizedMessage;

/// A dialog the UI shows and answers with a [`ModalResponse`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Modal {
    pub title: LocalizedMessage,
    pub message: LocalizedMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<LocalizedMessage>,
    /// Large choice buttons, one per option.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub big_buttons: Vec<ModalButton>,
    pub buttons: Vec<ModalButton>,
    #[serde(flatten)]
    pub widget: Option<ModalWidget>,
}

impl Modal {
    pub fn new(title: LocalizedMessage, message: LocalizedMessage) -> Self {
        Self {
            title,
            message,
            detail: None,
            big_buttons: Vec::new(),
            buttons: Vec::new(),
            widget: None,
        }
    }

    /// The action attached to the button the user picked, if any.
    pub fn action_for(&self, response: &ModalResponse) -> Option<&Action> {
        let button = match *response {
            ModalResponse::BigButton(i) => self.big_buttons.get(i),
            ModalResponse::Button(i) => self.buttons.get(i),
            ModalResponse::Dismissed => None,
        };
        button.and_then(|b| b.action.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModalButton {
    pub label: LocalizedMessage,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<ButtonTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Dispatched when picked. `None` just closes the modal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
}

impl ModalButton {
    pub fn new(label: LocalizedMessage) -> Self {
        Self {
            label,
            tags: Vec::new(),
            icon: None,
            action: None,
        }
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    /// Standard cancel button; does nothing when picked.
    pub fn cancel() -> Self {
        Self {
            icon: Some("cross".into()),
            ..Self::new(LocalizedMessage::id("prompt.action.cancel"))
        }
    }

    pub fn is_cancel(&self) -> bool {
        self.action.is_none() && self.label.key() == Some("prompt.action.cancel")
    }
}

/// Small label shown next to a button.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ButtonTag {
    pub label: LocalizedMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Extra content rendered inside a modal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "widget", content = "widgetParams", rename_all = "kebab-case")]
pub enum ModalWidget {
    #[serde(rename_all = "camelCase")]
    ShowError { error_stack: String, log: String },
}

/// What the user did with a modal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalResponse {
    BigButton(usize),
    Button(usize),
    Dismissed,
}
