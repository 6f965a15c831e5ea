//! Install/launch decisions for a requested game.
//!
//! [`GameQueue::queue_game`] asks the engine which installations ("caves")
//! a game has. With none it reserves a unique install folder and queues a
//! download; with one it queues a launch; with several it asks the user
//! which to launch. [`GameQueue::queue_launch`] runs the launch itself as a
//! task, so failures reach the user and aborts stay silent.

pub mod error;
pub mod install_folder;
pub mod queue;
pub mod store;
pub mod types;
pub mod upload_button;

pub use error::QueueError;
pub use install_folder::{MAX_FOLDER_CANDIDATES, install_folder_name, reserve_install_folder};
pub use queue::{GameQueue, QueueDecision};
pub use store::{CaveStore, MemoryCaveStore};
pub use types::{Platform, Preferences, Runtime};
pub use upload_button::{cave_button, format_size, upload_button};
