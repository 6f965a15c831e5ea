use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::constants::{
    METHOD_FETCH_CAVES_BY_GAME_ID, METHOD_LAUNCH, METHOD_LOG, METHOD_META_AUTHENTICATE,
    METHOD_OPERATION_PROGRESS,
};
use crate::types::{Cave, GameId, LogLevel};

/// A request the client sends to the engine.
///
/// Implemented on the params type; `Response` is what the engine answers with.
pub trait RpcRequest: Serialize + Send + Sync {
    const METHOD: &'static str;
    type Response: DeserializeOwned + Send;
}

/// A notification pushed by the engine.
pub trait RpcNotification: DeserializeOwned + Send + 'static {
    const METHOD: &'static str;
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Proves to the engine that we are the process that started it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaAuthenticate {
    pub secret: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaAuthenticateResult {
    pub ok: bool,
}

impl RpcRequest for MetaAuthenticate {
    const METHOD: &'static str = METHOD_META_AUTHENTICATE;
    type Response = MetaAuthenticateResult;
}

/// Lists every installation of a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchCavesByGameId {
    pub game_id: GameId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchCavesByGameIdResult {
    #[serde(default)]
    pub caves: Vec<Cave>,
}

impl RpcRequest for FetchCavesByGameId {
    const METHOD: &'static str = METHOD_FETCH_CAVES_BY_GAME_ID;
    type Response = FetchCavesByGameIdResult;
}

/// Launches an installed game. Resolves once the game has exited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Launch {
    pub cave_id: String,
    pub prereqs_dir: String,
    #[serde(default)]
    pub sandbox: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaunchResult {}

impl RpcRequest for Launch {
    const METHOD: &'static str = METHOD_LAUNCH;
    type Response = LaunchResult;
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Progress of the operation in flight.
///
/// The payload is kept exactly as the engine sent it; the accessors read the
/// well-known fields without normalising anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressParams(serde_json::Value);

impl ProgressParams {
    pub fn new(payload: serde_json::Value) -> Self {
        Self(payload)
    }

    /// Completed fraction, if the payload carries a numeric one.
    pub fn progress(&self) -> Option<f64> {
        self.number("progress")
    }

    /// Seconds remaining.
    pub fn eta(&self) -> Option<f64> {
        self.number("eta")
    }

    /// Bytes per second.
    pub fn bps(&self) -> Option<f64> {
        self.number("bps")
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        self.0
    }

    fn number(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(serde_json::Value::as_f64)
    }
}

impl RpcNotification for ProgressParams {
    const METHOD: &'static str = METHOD_OPERATION_PROGRESS;
}

/// A log line emitted by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogParams {
    pub level: LogLevel,
    pub message: String,
}

impl RpcNotification for LogParams {
    const METHOD: &'static str = METHOD_LOG;
}

// ---------------------------------------------------------------------------
// Process stdout
// ---------------------------------------------------------------------------

/// Address announced by the engine once it listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpListenInfo {
    pub address: String,
}

/// One JSON line printed by the engine process on stdout.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum EngineLine {
    /// The engine is ready for a client.
    #[serde(rename = "butlerd/listen-notification")]
    ListenNotification { secret: String, tcp: TcpListenInfo },
    #[serde(rename = "log")]
    Log { level: LogLevel, message: String },
    /// Forward compatibility: other line types are ignored.
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_caves_params_are_camel_case() {
        let value = serde_json::to_value(FetchCavesByGameId { game_id: 42 }).unwrap();
        assert_eq!(value, serde_json::json!({"gameId": 42}));
        assert_eq!(FetchCavesByGameId::METHOD, "Fetch.CavesByGameID");
    }

    #[test]
    fn fetch_caves_result_tolerates_missing_list() {
        let parsed: FetchCavesByGameIdResult = serde_json::from_str("{}").unwrap();
        assert!(parsed.caves.is_empty());
    }

    #[test]
    fn progress_payload_is_kept_as_sent() {
        let json = r#"{"progress":0.5,"eta":null,"stage":"download","bps":"fast"}"#;
        let params: ProgressParams = serde_json::from_str(json).unwrap();
        assert_eq!(params.progress(), Some(0.5));
        assert_eq!(params.eta(), None);
        assert_eq!(params.bps(), None);
        assert_eq!(params.get("stage").unwrap(), "download");

        let back = serde_json::to_value(&params).unwrap();
        assert_eq!(back, serde_json::from_str::<serde_json::Value>(json).unwrap());
    }

    #[test]
    fn progress_without_fraction_stays_without_one() {
        let params: ProgressParams = serde_json::from_str(r#"{"stage":"prepare"}"#).unwrap();
        assert_eq!(params.progress(), None);
        assert_eq!(
            serde_json::to_string(&params).unwrap(),
            r#"{"stage":"prepare"}"#
        );
    }

    #[test]
    fn log_params_parse() {
        let params: LogParams =
            serde_json::from_str(r#"{"level":"warning","message":"disk almost full"}"#).unwrap();
        assert_eq!(params.level, LogLevel::Warning);
        assert_eq!(params.message, "disk almost full");
    }

    #[test]
    fn engine_line_listen_notification() {
        let line = r#"{"type":"butlerd/listen-notification","secret":"s3","tcp":{"address":"127.0.0.1:9000"},"time":1}"#;
        let parsed: EngineLine = serde_json::from_str(line).unwrap();
        assert_eq!(
            parsed,
            EngineLine::ListenNotification {
                secret: "s3".into(),
                tcp: TcpListenInfo {
                    address: "127.0.0.1:9000".into()
                },
            }
        );
    }

    #[test]
    fn engine_line_log_and_unknown() {
        let parsed: EngineLine =
            serde_json::from_str(r#"{"type":"log","level":"info","message":"hi"}"#).unwrap();
        assert!(matches!(parsed, EngineLine::Log { level: LogLevel::Info, .. }));

        let parsed: EngineLine = serde_json::from_str(r#"{"type":"progress","value":3}"#).unwrap();
        assert_eq!(parsed, EngineLine::Other);
    }
}
