//! Forwards engine notifications to a progress sink and a logger.

use std::sync::Arc;

use hearth_protocol::{LogLevel, LogParams, ProgressParams};

use crate::client::{Client, Subscription};
use crate::logger::{Level, Logger};

/// Receives progress payloads exactly as the engine sent them.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, progress: ProgressParams);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressParams) + Send + Sync,
{
    fn emit(&self, progress: ProgressParams) {
        self(progress)
    }
}

/// Live routing for one client. Dropping it unsubscribes both streams.
#[must_use = "routing stops when the attachment is dropped"]
#[derive(Debug)]
pub struct Attachment {
    progress: Subscription,
    log: Subscription,
}

impl Attachment {
    /// Stops routing now.
    pub fn detach(self) {
        let Self { progress, log } = self;
        progress.dispose();
        log.dispose();
    }
}

/// Subscribes to progress and log notifications on `client`.
///
/// Log lines land in an `engine` child of `logger`. Handlers run on the
/// client's read task, one notification at a time, so per-kind order is
/// the wire order.
pub fn attach(client: &Client, logger: &Logger, sink: Arc<dyn ProgressSink>) -> Attachment {
    let progress = client.on_notification::<ProgressParams, _>(move |params| sink.emit(params));

    let logger = logger.child("engine");
    let log = client.on_notification::<LogParams, _>(move |params| {
        route_log(&logger, &params.level, &params.message)
    });

    Attachment { progress, log }
}

/// Maps an engine log level onto the logger. Unknown levels are logged as
/// info, prefixed with the level name.
pub fn route_log(logger: &Logger, level: &LogLevel, message: &str) {
    match level {
        LogLevel::Debug => logger.log(Level::Debug, message),
        LogLevel::Info => logger.log(Level::Info, message),
        LogLevel::Warning => logger.log(Level::Warn, message),
        LogLevel::Error => logger.log(Level::Error, message),
        LogLevel::Other(name) => logger.log(Level::Info, &format!("[{name}] {message}")),
    }
}
