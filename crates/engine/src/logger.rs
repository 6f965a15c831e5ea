//! Scoped logger handle passed down the call chain.
//!
//! Every line goes to `tracing` with a `scope` field. A logger can also
//! capture its lines so a task's transcript can be shown next to an error.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};

/// Severity of a logged line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        };
        f.write_str(s)
    }
}

/// A captured log line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub time: DateTime<Utc>,
    pub level: Level,
    pub scope: String,
    pub message: String,
}

type Capture = Arc<Mutex<Vec<LogRecord>>>;

/// Cheap-to-clone logger bound to a scope.
#[derive(Clone)]
pub struct Logger {
    scope: Arc<str>,
    capture: Option<Capture>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("scope", &self.scope)
            .field("capturing", &self.capture.is_some())
            .finish()
    }
}

impl Logger {
    /// Creates a root logger that only forwards to `tracing`.
    pub fn new(scope: &str) -> Self {
        Self {
            scope: scope.into(),
            capture: None,
        }
    }

    /// Creates a root logger that also records every line.
    pub fn capturing(scope: &str) -> Self {
        Self::new(scope).with_capture()
    }

    /// Returns a copy of this logger recording into a fresh buffer.
    ///
    /// Lines logged through `self` are not recorded in it.
    pub fn with_capture(&self) -> Self {
        Self {
            scope: self.scope.clone(),
            capture: Some(Arc::new(Mutex::new(Vec::new()))),
        }
    }

    /// Creates a child scope (`parent/name`) sharing this logger's buffer.
    pub fn child(&self, name: &str) -> Self {
        Self {
            scope: format!("{}/{name}", self.scope).into(),
            capture: self.capture.clone(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(Level::Debug, message.as_ref());
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(Level::Info, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(Level::Warn, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(Level::Error, message.as_ref());
    }

    /// Logs one line at the given level.
    pub fn log(&self, level: Level, message: &str) {
        let scope = &*self.scope;
        match level {
            Level::Debug => tracing::debug!(scope, "{message}"),
            Level::Info => tracing::info!(scope, "{message}"),
            Level::Warn => tracing::warn!(scope, "{message}"),
            Level::Error => tracing::error!(scope, "{message}"),
        }

        if let Some(capture) = &self.capture {
            capture
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(LogRecord {
                    time: Utc::now(),
                    level,
                    scope: scope.to_string(),
                    message: message.to_string(),
                });
        }
    }

    /// Returns the captured records (empty if not capturing).
    pub fn records(&self) -> Vec<LogRecord> {
        match &self.capture {
            Some(capture) => capture
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            None => Vec::new(),
        }
    }

    /// Renders the captured records, one line each.
    pub fn transcript(&self) -> String {
        self.records()
            .iter()
            .map(|r| {
                format!(
                    "{} [{}] {}: {}",
                    r.time.format("%H:%M:%S%.3f"),
                    r.level,
                    r.scope,
                    r.message
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_logger_records_nothing() {
        let logger = Logger::new("root");
        logger.info("hello");
        assert!(logger.records().is_empty());
        assert_eq!(logger.transcript(), "");
    }

    #[test]
    fn capturing_logger_records_levels_in_order() {
        let logger = Logger::capturing("task");
        logger.debug("a");
        logger.info("b");
        logger.warn("c");
        logger.error("d");

        let records = logger.records();
        let levels: Vec<Level> = records.iter().map(|r| r.level).collect();
        assert_eq!(levels, vec![Level::Debug, Level::Info, Level::Warn, Level::Error]);
        let messages: Vec<&str> = records.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn child_shares_capture_and_nests_scope() {
        let parent = Logger::capturing("queue");
        let child = parent.child("engine");
        assert_eq!(child.scope(), "queue/engine");

        child.warn("from child");
        let records = parent.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].scope, "queue/engine");
    }

    #[test]
    fn with_capture_starts_a_separate_buffer() {
        let parent = Logger::capturing("root");
        let task = parent.child("launch").with_capture();
        task.info("only here");
        assert!(parent.records().is_empty());
        assert_eq!(task.records().len(), 1);
    }

    #[test]
    fn transcript_contains_level_scope_and_message() {
        let logger = Logger::capturing("launch");
        logger.warn("low disk space");
        let transcript = logger.transcript();
        assert!(transcript.contains("[warn] launch: low disk space"));
    }
}
