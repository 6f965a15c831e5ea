//! Engine error types.

use std::path::PathBuf;
use std::time::Duration;

use hearth_protocol::constants::is_cancellation_code;

/// Errors produced while starting or talking to the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to start engine {}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("engine startup failed: {0}")]
    Startup(String),

    #[error("engine did not become ready within {0:?}")]
    StartupTimeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("engine error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    #[error("connection closed")]
    Closed,

    #[error("client already delivered for this session")]
    ClientTaken,

    #[error("session was already started")]
    SessionReused,
}

impl EngineError {
    /// Returns `true` if the engine reported an intentional stop.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, EngineError::Rpc { code, .. } if is_cancellation_code(*code))
    }
}

impl From<hearth_protocol::RpcError> for EngineError {
    fn from(err: hearth_protocol::RpcError) -> Self {
        EngineError::Rpc {
            code: err.code,
            message: err.message,
            data: err.data,
        }
    }
}

impl From<hearth_protocol::EnvelopeError> for EngineError {
    fn from(err: hearth_protocol::EnvelopeError) -> Self {
        match err {
            hearth_protocol::EnvelopeError::Json(e) => EngineError::Json(e),
            other => EngineError::Startup(other.to_string()),
        }
    }
}
