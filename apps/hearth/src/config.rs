//! Client configuration.
//!
//! Reads/writes JSON at `~/.config/hearth/config.json` (or
//! `$XDG_CONFIG_HOME/hearth`, `%APPDATA%\hearth` on Windows). Keys that are
//! missing fall back to defaults; a file that does not parse is ignored.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hearth_engine::EngineConfig;
use hearth_protocol::Credentials;
use hearth_protocol::constants::{DEFAULT_API_SERVER, DEFAULT_STARTUP_TIMEOUT};
use hearth_queue::Preferences;
use serde::{Deserialize, Serialize};

/// Environment variable that replaces `engineExecutable`.
pub const ENGINE_ENV: &str = "HEARTH_ENGINE";

const DEFAULT_INSTALL_LOCATION: &str = "appdata";

/// On-disk config format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    engine_executable: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    engine_db_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    startup_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    api_server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_install_location: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    install_locations: HashMap<String, PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prereqs_dir: Option<PathBuf>,
    #[serde(default)]
    isolate_apps: bool,
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct HearthConfig {
    pub engine_executable: PathBuf,
    pub engine_db_path: PathBuf,
    pub startup_timeout: Duration,
    pub api_server: String,
    pub api_key: Option<String>,
    pub default_install_location: String,
    pub install_locations: HashMap<String, PathBuf>,
    pub prereqs_dir: PathBuf,
    pub isolate_apps: bool,
    /// Set from [`ENGINE_ENV`]; used for spawning, never saved.
    engine_override: Option<PathBuf>,
    file_path: PathBuf,
}

impl Default for HearthConfig {
    fn default() -> Self {
        Self::with_data_dir(data_base_dir().join("hearth"))
    }
}

impl HearthConfig {
    /// Defaults with every path under `data_dir`.
    fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            engine_executable: data_dir.join("bin").join("butler"),
            engine_db_path: data_dir.join("db").join("butler.db"),
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            api_server: DEFAULT_API_SERVER.into(),
            api_key: None,
            default_install_location: DEFAULT_INSTALL_LOCATION.into(),
            install_locations: HashMap::from([(
                DEFAULT_INSTALL_LOCATION.to_string(),
                data_dir.join("apps"),
            )]),
            prereqs_dir: data_dir.join("prereqs"),
            isolate_apps: false,
            engine_override: None,
            file_path: config_file_path(),
        }
    }

    /// Loads configuration from the default location.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(config_file_path())
    }

    /// Loads configuration from `file_path`, then applies [`ENGINE_ENV`].
    pub fn load_from(file_path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let mut config = Self::read_file(file_path.into())?;
        config.apply_engine_override(std::env::var(ENGINE_ENV).ok());
        Ok(config)
    }

    fn read_file(file_path: PathBuf) -> anyhow::Result<Self> {
        let mut config = HearthConfig {
            file_path: file_path.clone(),
            ..Default::default()
        };

        if file_path.exists() {
            let content = std::fs::read_to_string(&file_path)?;
            match serde_json::from_str::<ConfigFile>(&content) {
                Ok(file) => config.apply(file),
                Err(e) => tracing::warn!(
                    path = %file_path.display(),
                    "failed to parse config, using defaults: {e}"
                ),
            }
        }

        Ok(config)
    }

    fn apply(&mut self, file: ConfigFile) {
        if let Some(exe) = file.engine_executable {
            self.engine_executable = exe;
        }
        if let Some(db) = file.engine_db_path {
            self.engine_db_path = db;
        }
        if let Some(secs) = file.startup_timeout_secs.filter(|s| *s > 0) {
            self.startup_timeout = Duration::from_secs(secs);
        }
        if let Some(server) = file.api_server.filter(|s| !s.is_empty()) {
            self.api_server = server;
        }
        self.api_key = file.api_key.filter(|k| !k.is_empty());
        if let Some(location) = file.default_install_location.filter(|l| !l.is_empty()) {
            self.default_install_location = location;
        }
        self.install_locations.extend(file.install_locations);
        if let Some(prereqs) = file.prereqs_dir {
            self.prereqs_dir = prereqs;
        }
        self.isolate_apps = file.isolate_apps;
    }

    fn apply_engine_override(&mut self, value: Option<String>) {
        if let Some(exe) = value.filter(|v| !v.is_empty()) {
            self.engine_override = Some(PathBuf::from(exe));
        }
    }

    /// The engine binary to spawn: the [`ENGINE_ENV`] override if set.
    pub fn effective_engine(&self) -> &Path {
        self.engine_override
            .as_deref()
            .unwrap_or(&self.engine_executable)
    }

    /// Saves configuration to disk. The [`ENGINE_ENV`] override is not
    /// written.
    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = ConfigFile {
            engine_executable: Some(self.engine_executable.clone()),
            engine_db_path: Some(self.engine_db_path.clone()),
            startup_timeout_secs: Some(self.startup_timeout.as_secs()),
            api_server: Some(self.api_server.clone()),
            api_key: self.api_key.clone(),
            default_install_location: Some(self.default_install_location.clone()),
            install_locations: self.install_locations.clone(),
            prereqs_dir: Some(self.prereqs_dir.clone()),
            isolate_apps: self.isolate_apps,
        };

        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(&self.file_path, &json)?;
        set_permissions_0600(&self.file_path);

        tracing::debug!("configuration saved");
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::new(self.effective_engine(), &self.engine_db_path);
        config.startup_timeout = self.startup_timeout;
        config
    }

    pub fn preferences(&self) -> Preferences {
        Preferences {
            default_install_location: self.default_install_location.clone(),
            install_locations: self.install_locations.clone(),
            prereqs_dir: self.prereqs_dir.clone(),
            isolate_apps: self.isolate_apps,
            api_server: self.api_server.clone(),
        }
    }

    /// Credentials from `api_key`, or the configured key.
    pub fn credentials(&self, api_key: Option<String>) -> Option<Credentials> {
        api_key.or_else(|| self.api_key.clone()).map(|api_key| Credentials {
            api_key,
            download_key: None,
        })
    }
}

fn set_permissions_0600(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}

fn config_file_path() -> PathBuf {
    config_base_dir().join("hearth").join("config.json")
}

fn config_base_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata)
    }

    #[cfg(not(target_os = "windows"))]
    {
        if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME").filter(|d| !d.is_empty()) {
            return PathBuf::from(dir);
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home).join(".config")
    }
}

fn data_base_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        config_base_dir()
    }

    #[cfg(not(target_os = "windows"))]
    {
        if let Some(dir) = std::env::var_os("XDG_DATA_HOME").filter(|d| !d.is_empty()) {
            return PathBuf::from(dir);
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home).join(".local").join("share")
    }
}
