use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric identifier of a game on the store.
pub type GameId = i64;

/// Numeric identifier of an upload (a downloadable build of a game).
pub type UploadId = i64;

/// A game as known to the library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: GameId,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
}

impl Game {
    pub fn new(id: GameId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            url: None,
            cover_url: None,
            classification: None,
        }
    }
}

/// Platforms an upload is flagged for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platforms {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windows: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linux: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub osx: Option<String>,
}

/// A downloadable build of a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Upload {
    pub id: UploadId,
    #[serde(default)]
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub upload_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platforms: Option<Platforms>,
}

/// Directory layout used for an installation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum PathScheme {
    /// Per-user folder, kept for old installs.
    LegacyPerUser,
    /// Shared `<location>/<folder>` layout used for every new install.
    #[default]
    ModernShared,
}

impl From<PathScheme> for u8 {
    fn from(scheme: PathScheme) -> Self {
        match scheme {
            PathScheme::LegacyPerUser => 1,
            PathScheme::ModernShared => 2,
        }
    }
}

impl TryFrom<u8> for PathScheme {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PathScheme::LegacyPerUser),
            2 => Ok(PathScheme::ModernShared),
            other => Err(format!("unknown path scheme {other}")),
        }
    }
}

/// A persisted installation of a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cave {
    pub id: String,
    pub game: Game,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload: Option<Upload>,
    pub install_location: String,
    pub install_folder: String,
    #[serde(default)]
    pub path_scheme: PathScheme,
}

/// Where a new installation will land, before it exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaveLocation {
    pub id: String,
    pub install_location: String,
    pub install_folder: String,
    pub path_scheme: PathScheme,
}

/// A download key the user owns for a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadKey {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<GameId>,
}

/// Credentials as held by the caller (profile + optional key).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_key: Option<DownloadKey>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("download_key", &self.download_key)
            .finish()
    }
}

/// Credentials payload for authenticated engine calls.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameCredentials {
    pub api_key: String,
    pub download_key: Option<i64>,
    pub server: String,
}

impl GameCredentials {
    /// Builds the wire payload from caller credentials and an API server URL.
    pub fn new(credentials: &Credentials, server: impl Into<String>) -> Self {
        Self {
            api_key: credentials.api_key.clone(),
            download_key: credentials.download_key.as_ref().map(|k| k.id),
            server: server.into(),
        }
    }
}

impl fmt::Debug for GameCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameCredentials")
            .field("api_key", &"<redacted>")
            .field("download_key", &self.download_key)
            .field("server", &self.server)
            .finish()
    }
}

/// Severity attached to engine log lines.
///
/// Unknown levels are kept verbatim so they can be shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Other(String),
}

impl From<String> for LogLevel {
    fn from(level: String) -> Self {
        match level.as_str() {
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warning" => LogLevel::Warning,
            "error" => LogLevel::Error,
            _ => LogLevel::Other(level),
        }
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => "debug".into(),
            LogLevel::Info => "info".into(),
            LogLevel::Warning => "warning".into(),
            LogLevel::Error => "error".into(),
            LogLevel::Other(s) => s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cave_parses_engine_json() {
        let json = r#"{
            "id": "c-1",
            "game": {"id": 3, "title": "Overland"},
            "upload": {"id": 9, "filename": "overland-linux.zip", "size": 1024},
            "installLocation": "appdata",
            "installFolder": "overland",
            "pathScheme": 2
        }"#;
        let cave: Cave = serde_json::from_str(json).unwrap();
        assert_eq!(cave.id, "c-1");
        assert_eq!(cave.game.title, "Overland");
        assert_eq!(cave.upload.unwrap().id, 9);
        assert_eq!(cave.path_scheme, PathScheme::ModernShared);
    }

    #[test]
    fn path_scheme_is_numeric() {
        assert_eq!(serde_json::to_string(&PathScheme::ModernShared).unwrap(), "2");
        assert_eq!(serde_json::to_string(&PathScheme::LegacyPerUser).unwrap(), "1");
        assert!(serde_json::from_str::<PathScheme>("7").is_err());
    }

    #[test]
    fn missing_path_scheme_defaults_to_modern() {
        let json = r#"{"id":"c","game":{"id":1},"installLocation":"a","installFolder":"b"}"#;
        let cave: Cave = serde_json::from_str(json).unwrap();
        assert_eq!(cave.path_scheme, PathScheme::ModernShared);
        assert!(cave.upload.is_none());
    }

    #[test]
    fn game_credentials_from_caller_data() {
        let creds = Credentials {
            api_key: "secret".into(),
            download_key: Some(DownloadKey {
                id: 77,
                game_id: Some(3),
            }),
        };
        let wire = GameCredentials::new(&creds, "https://itch.io/api/1");
        let value = serde_json::to_value(&wire).unwrap();
        assert_eq!(value["apiKey"], "secret");
        assert_eq!(value["downloadKey"], 77);
        assert_eq!(value["server"], "https://itch.io/api/1");
    }

    #[test]
    fn game_credentials_without_key_is_null() {
        let creds = Credentials {
            api_key: "k".into(),
            download_key: None,
        };
        let value = serde_json::to_value(GameCredentials::new(&creds, "s")).unwrap();
        assert!(value["downloadKey"].is_null());
    }

    #[test]
    fn credentials_debug_redacts_key() {
        let creds = Credentials {
            api_key: "hunter2".into(),
            download_key: None,
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }

    #[test]
    fn log_level_known_and_other() {
        let levels: Vec<LogLevel> =
            serde_json::from_str(r#"["debug","info","warning","error","trace"]"#).unwrap();
        assert_eq!(
            levels,
            vec![
                LogLevel::Debug,
                LogLevel::Info,
                LogLevel::Warning,
                LogLevel::Error,
                LogLevel::Other("trace".into()),
            ]
        );
        assert_eq!(serde_json::to_string(&LogLevel::Warning).unwrap(), "\"warning\"");
    }
}
