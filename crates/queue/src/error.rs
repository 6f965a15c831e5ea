use hearth_engine::EngineError;

/// Errors from the install/launch decision engine.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("no free install folder for {folder:?} after {attempts} attempts")]
    FolderCollision { folder: String, attempts: u32 },

    #[error("unknown install location {0:?}")]
    UnknownInstallLocation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
