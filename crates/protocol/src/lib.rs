pub mod constants;
pub mod envelope;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use envelope::{Envelope, EnvelopeError, Incoming, RpcError};
pub use messages::{EngineLine, LogParams, ProgressParams, RpcNotification, RpcRequest};
pub use types::{
    Cave, CaveLocation, Credentials, DownloadKey, Game, GameCredentials, GameId, LogLevel,
    PathScheme, Platforms, Upload, UploadId,
};
