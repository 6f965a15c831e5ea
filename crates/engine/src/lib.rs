//! Engine sessions: process supervision, JSON-RPC client, notification routing.
//!
//! Every install or launch request gets its own engine process. The
//! [`SessionManager`] starts it, hands exactly one [`Client`] to a callback
//! and always cancels the process afterwards, whatever the callback did.
//! [`router::attach`] forwards the engine's progress and log notifications
//! for the lifetime of that client.

pub mod client;
pub mod error;
pub mod logger;
#[cfg(any(test, feature = "test-util"))]
pub mod loopback;
pub mod process;
mod pumps;
pub mod router;
pub mod session;

pub use client::{Client, Subscription};
pub use error::EngineError;
pub use logger::{Level, LogRecord, Logger};
pub use process::ProcessLauncher;
pub use router::{Attachment, ProgressSink, attach, route_log};
pub use session::{
    EngineConfig, EngineHandle, EngineLauncher, EngineSession, SessionManager, SessionState,
};
