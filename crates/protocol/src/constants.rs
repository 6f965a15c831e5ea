use std::time::Duration;

/// Value of the `jsonrpc` field on every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Maximum length of a single line on the engine transport (8 MB).
///
/// Cave listings for large libraries can get big, but nothing legitimate
/// comes close to this.
pub const MAX_LINE_LENGTH: usize = 8 * 1024 * 1024;

/// Time allowed for the engine to announce its listen address.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default itch.io API server used when building game credentials.
pub const DEFAULT_API_SERVER: &str = "https://itch.io/api/1";

/// Arguments placed before `--dbpath` when starting the engine.
pub const ENGINE_DAEMON_ARGS: &[&str] = &["daemon", "--json"];

/// Flag that precedes the engine's state-storage path.
pub const ENGINE_DB_PATH_FLAG: &str = "--dbpath";

// ---------------------------------------------------------------------------
// Method names
// ---------------------------------------------------------------------------

pub const METHOD_META_AUTHENTICATE: &str = "Meta.Authenticate";
pub const METHOD_FETCH_CAVES_BY_GAME_ID: &str = "Fetch.CavesByGameID";
pub const METHOD_LAUNCH: &str = "Launch";
pub const METHOD_OPERATION_PROGRESS: &str = "Operation.Progress";
pub const METHOD_LOG: &str = "Log";

// ---------------------------------------------------------------------------
// Error codes
// ---------------------------------------------------------------------------

/// JSON-RPC: the method is not served by this peer.
pub const RPC_METHOD_NOT_FOUND: i64 = -32601;

/// Engine: an operation was aborted before it completed.
pub const ENGINE_OPERATION_ABORTED: i64 = 410;

/// Engine: an operation was cancelled on request.
pub const ENGINE_OPERATION_CANCELLED: i64 = 499;

/// Returns `true` for engine error codes that mean "intentionally stopped".
pub fn is_cancellation_code(code: i64) -> bool {
    matches!(code, ENGINE_OPERATION_ABORTED | ENGINE_OPERATION_CANCELLED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_codes() {
        assert!(is_cancellation_code(410));
        assert!(is_cancellation_code(499));
        assert!(!is_cancellation_code(500));
        assert!(!is_cancellation_code(RPC_METHOD_NOT_FOUND));
    }
}
