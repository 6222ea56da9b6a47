use minicluster_engine::EngineError;
use thiserror::Error;

/// Result type for node lifecycle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that end a node's lifecycle.
#[derive(Debug, Error)]
pub enum Error {
    /// Deciding how to enter the cluster failed.
    #[error("bootstrap failed: {0}")]
    Bootstrap(#[from] minicluster_membership::Error),

    /// The peer scan did not complete.
    #[error("peer discovery failed: {0}")]
    Discovery(#[source] tokio::task::JoinError),

    /// The engine failed while running.
    #[error("engine failed: {0}")]
    EngineFailed(#[source] EngineError),

    /// A collaborator was not supplied to the builder.
    #[error("{0} not configured")]
    NotConfigured(&'static str),

    /// The node could not remove itself from the cluster on shutdown.
    #[error("failed to leave the cluster after {attempts} attempt(s): {source}")]
    SelfRemoval {
        /// Attempts made.
        attempts: u32,
        /// The last failure.
        #[source]
        source: EngineError,
    },

    /// The engine could not be started.
    #[error(transparent)]
    Start(#[from] minicluster_engine::Error),

    /// The engine could not be stopped on shutdown.
    #[error("failed to stop engine: {0}")]
    Stop(#[source] EngineError),
}
