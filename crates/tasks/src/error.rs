//! Errors returned by task work, and their classification.

use hearth_engine::EngineError;

use crate::i18n::LocalizedMessage;

/// Error type returned by task work.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("task aborted")]
    Aborted,

    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A failure that carries user-facing text.
    #[error("{detail}")]
    Reasoned {
        reason: Vec<LocalizedMessage>,
        detail: String,
    },

    #[error("{0}")]
    Failed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TaskError {
    /// Failure with a single user-facing reason.
    pub fn reasoned(reason: LocalizedMessage, detail: impl Into<String>) -> Self {
        Self::Reasoned {
            reason: vec![reason],
            detail: detail.into(),
        }
    }

    pub fn classify(&self) -> ErrorClassification {
        match self {
            TaskError::Aborted => ErrorClassification::Aborted,
            TaskError::Engine(e) if e.is_cancellation() => ErrorClassification::Aborted,
            TaskError::Reasoned { reason, .. } if !reason.is_empty() => {
                ErrorClassification::Reasoned(reason.clone())
            }
            other => ErrorClassification::Raw(crate::surface::diagnostic(other)),
        }
    }
}

/// How a failure is presented.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorClassification {
    /// Stopped on purpose. Never shown.
    Aborted,
    /// Shown using the carried messages.
    Reasoned(Vec<LocalizedMessage>),
    /// Shown using the first line of the text.
    Raw(String),
}
