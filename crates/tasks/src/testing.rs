//! Recording dispatcher for tests.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};

use crate::dispatch::{Action, Dispatch};
use crate::modal::{Modal, ModalResponse};

/// Records every action and modal; answers modals from a queue.
///
/// With no queued answer a modal is dismissed.
#[derive(Default)]
pub struct RecordingDispatch {
    actions: Mutex<Vec<Action>>,
    modals: Mutex<Vec<Modal>>,
    answers: Mutex<VecDeque<ModalResponse>>,
}

impl RecordingDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the answer to the next modal.
    pub fn answer(&self, response: ModalResponse) {
        self.answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Actions other than task lifecycle events.
    pub fn queue_actions(&self) -> Vec<Action> {
        self.actions()
            .into_iter()
            .filter(|a| {
                !matches!(
                    a,
                    Action::TaskStarted { .. } | Action::TaskProgress { .. } | Action::TaskEnded { .. }
                )
            })
            .collect()
    }

    pub fn modals(&self) -> Vec<Modal> {
        self.modals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Dispatch for RecordingDispatch {
    fn dispatch(&self, action: Action) {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(action);
    }

    fn prompt(&self, modal: Modal) -> Pin<Box<dyn Future<Output = ModalResponse> + Send + '_>> {
        self.modals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(modal);
        let response = self
            .answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(ModalResponse::Dismissed);
        Box::pin(async move { response })
    }
}
