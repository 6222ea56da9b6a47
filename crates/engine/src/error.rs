use std::path::PathBuf;
use std::time::Duration;

use minicluster_membership::AdminError;
use thiserror::Error;

/// Result type for supervisor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by an engine adapter.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum EngineError {
    /// An administrative call against the engine failed.
    #[error(transparent)]
    Admin(#[from] AdminError),

    /// The engine binary could not be located.
    #[error("engine binary not found: {0}")]
    BinaryNotFound(String),

    /// The engine process exited unexpectedly.
    #[error("engine exited: {0}")]
    Exited(String),

    /// The engine has not reported its ids yet.
    #[error("engine is not ready")]
    NotReady,

    /// The engine process could not be spawned.
    #[error("failed to spawn engine: {0}")]
    Spawn(String),
}

/// Errors that can occur while supervising the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// The data directory could not be created.
    #[error("failed to create data directory {path}: {source}")]
    DataDir {
        /// Directory that was being created.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The engine did not report readiness in time.
    #[error("engine not ready after {0:?}")]
    ReadyTimeout(Duration),

    /// The engine failed to start or exited before becoming ready.
    #[error("failed to start engine: {0}")]
    Start(#[source] EngineError),
}
