//! Task wrapper for engine work.
//!
//! A [`Task`] names a unit of work for one game. [`TaskRunner::run`] executes
//! it, tells the UI when it starts, progresses and ends, and decides how a
//! failure is presented: aborted work is dropped silently, anything else
//! becomes a modal carrying the error's message, full text and the task log.

pub mod context;
pub mod dispatch;
pub mod error;
pub mod i18n;
pub mod modal;
pub mod surface;
pub mod task;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use context::TaskContext;
pub use dispatch::{Action, Dispatch, DownloadReason, QueueDownload, TaskOutcome};
pub use error::{ErrorClassification, TaskError};
pub use i18n::LocalizedMessage;
pub use modal::{ButtonTag, Modal, ModalButton, ModalResponse, ModalWidget};
pub use task::{Task, TaskRunner};
