use std::collections::HashMap;
use std::path::{Path, PathBuf};

use hearth_protocol::constants::DEFAULT_API_SERVER;

use crate::error::QueueError;

/// User preferences the decision engine reads.
#[derive(Debug, Clone, PartialEq)]
pub struct Preferences {
    /// Install location id used for new installs.
    pub default_install_location: String,
    /// Install location id -> directory.
    pub install_locations: HashMap<String, PathBuf>,
    pub prereqs_dir: PathBuf,
    /// Run games in the sandbox where the platform supports it.
    pub isolate_apps: bool,
    pub api_server: String,
}

impl Preferences {
    /// Preferences with a single `appdata` location rooted at `apps_dir`.
    pub fn with_apps_dir(apps_dir: impl Into<PathBuf>, prereqs_dir: impl Into<PathBuf>) -> Self {
        Self {
            default_install_location: "appdata".into(),
            install_locations: HashMap::from([("appdata".to_string(), apps_dir.into())]),
            prereqs_dir: prereqs_dir.into(),
            isolate_apps: false,
            api_server: DEFAULT_API_SERVER.into(),
        }
    }

    /// Directory of an install location.
    pub fn install_location_path(&self, id: &str) -> Result<&Path, QueueError> {
        self.install_locations
            .get(id)
            .map(PathBuf::as_path)
            .ok_or_else(|| QueueError::UnknownInstallLocation(id.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Linux,
    MacOs,
}

/// The machine games are launched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Runtime {
    pub platform: Platform,
}

impl Runtime {
    pub fn current() -> Self {
        let platform = if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        };
        Self { platform }
    }

    /// Whether launches should be sandboxed.
    pub fn sandbox(&self, prefs: &Preferences) -> bool {
        prefs.isolate_apps && matches!(self.platform, Platform::Windows | Platform::Linux)
    }
}
