//! Adapter traits over an external consensus engine

use async_trait::async_trait;

use crate::config::EngineConfig;
use crate::error::EngineError;

/// Ids the engine assigns once it is ready.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EngineIds {
    /// This member's id, lowercase hex.
    pub member_id: String,

    /// The cluster's id, lowercase hex.
    pub cluster_id: String,
}

/// Something that can launch engine instances.
#[async_trait]
pub trait Engine
where
    Self: Send + Sync + 'static,
{
    /// Handle to a launched instance.
    type Handle: EngineHandle;

    /// Launches an instance. Returns as soon as it is launched; readiness is
    /// awaited through [`EngineHandle::wait_ready`].
    async fn start(&self, config: &EngineConfig) -> Result<Self::Handle, EngineError>;
}

/// Control over one launched engine instance.
#[async_trait]
pub trait EngineHandle
where
    Self: Send + Sync + 'static,
{
    /// Resolves when the engine is ready to serve, or fails if it exits
    /// first. Not bounded in time.
    async fn wait_ready(&mut self) -> Result<EngineIds, EngineError>;

    /// Resolves at most once: `Ok` when the engine exits cleanly or was
    /// stopped, an error otherwise. Stays pending on every later call.
    async fn terminated(&mut self) -> Result<(), EngineError>;

    /// Removes this member from the cluster through the engine's own
    /// administrative interface.
    async fn remove_self(&self) -> Result<(), EngineError>;

    /// Stops the engine. Stopping a stopped engine is a no-op.
    async fn stop(&mut self) -> Result<(), EngineError>;

    /// Releases resources held for the engine.
    async fn close(&mut self) -> Result<(), EngineError>;
}
