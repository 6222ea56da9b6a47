//! Starts the consensus engine for a node and hands back a running handle.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod config;
mod engine;
mod error;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use config::EngineConfig;
pub use engine::{Engine, EngineHandle, EngineIds};
pub use error::{EngineError, Error, Result};

use std::time::Duration;

use minicluster_topology::{InitialMembership, NodeIdentity};
use tracing::{error, info, warn};

/// Default bound on engine readiness.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(60);

/// Launches engines and waits for them to become ready.
#[derive(Clone, Debug)]
pub struct EngineSupervisor<E>
where
    E: Engine,
{
    engine: E,
    ready_timeout: Duration,
}

impl<E> EngineSupervisor<E>
where
    E: Engine,
{
    /// Creates a supervisor launching through `engine`.
    pub const fn new(engine: E, ready_timeout: Duration) -> Self {
        Self {
            engine,
            ready_timeout,
        }
    }

    /// Starts the engine for `identity` with the given initial membership.
    ///
    /// The data directory is created first. If the engine is not ready
    /// within the ready timeout, or exits before becoming ready, it is
    /// stopped and closed before this returns.
    ///
    /// # Errors
    ///
    /// - [`Error::DataDir`] if the data directory cannot be created.
    /// - [`Error::Start`] if the engine cannot be launched or exits early.
    /// - [`Error::ReadyTimeout`] if the engine is not ready in time.
    pub async fn start(
        &self,
        identity: &NodeIdentity,
        membership: &InitialMembership,
    ) -> Result<RunningEngine<E::Handle>> {
        let config = EngineConfig::new(identity, membership);

        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .map_err(|source| Error::DataDir {
                path: config.data_dir.clone(),
                source,
            })?;

        info!(
            name = %config.name,
            state = %config.initial_cluster_state,
            initial_cluster = %config.initial_cluster,
            "starting engine"
        );

        let mut handle = self.engine.start(&config).await.map_err(Error::Start)?;

        match tokio::time::timeout(self.ready_timeout, handle.wait_ready()).await {
            Ok(Ok(ids)) => {
                info!("Cluster ID {}", ids.cluster_id);
                info!(member_id = %ids.member_id, "engine ready");

                Ok(RunningEngine { handle, ids })
            }
            Ok(Err(e)) => {
                error!("engine failed before becoming ready: {}", e);
                force_stop(&mut handle).await;

                Err(Error::Start(e))
            }
            Err(_) => {
                error!("engine not ready after {:?}, stopping it", self.ready_timeout);
                force_stop(&mut handle).await;

                Err(Error::ReadyTimeout(self.ready_timeout))
            }
        }
    }
}

async fn force_stop<H>(handle: &mut H)
where
    H: EngineHandle,
{
    if let Err(e) = handle.stop().await {
        warn!("failed to stop engine: {}", e);
    }

    if let Err(e) = handle.close().await {
        warn!("failed to close engine: {}", e);
    }
}

/// An engine that reported readiness.
#[derive(Debug)]
pub struct RunningEngine<H>
where
    H: EngineHandle,
{
    handle: H,
    ids: EngineIds,
}

impl<H> RunningEngine<H>
where
    H: EngineHandle,
{
    /// The member id assigned by the engine.
    pub fn id(&self) -> &str {
        &self.ids.member_id
    }

    /// The id of the cluster the engine belongs to.
    pub fn cluster_id(&self) -> &str {
        &self.ids.cluster_id
    }

    /// See [`EngineHandle::terminated`].
    ///
    /// # Errors
    ///
    /// Returns the engine's failure if it exited abnormally.
    pub async fn terminated(&mut self) -> std::result::Result<(), EngineError> {
        self.handle.terminated().await
    }

    /// See [`EngineHandle::remove_self`].
    ///
    /// # Errors
    ///
    /// Returns an error if the removal call fails.
    pub async fn remove_self(&self) -> std::result::Result<(), EngineError> {
        self.handle.remove_self().await
    }

    /// See [`EngineHandle::stop`].
    ///
    /// # Errors
    ///
    /// Returns an error if the engine could not be stopped.
    pub async fn stop(&mut self) -> std::result::Result<(), EngineError> {
        self.handle.stop().await
    }

    /// See [`EngineHandle::close`].
    ///
    /// # Errors
    ///
    /// Returns an error if resources could not be released.
    pub async fn close(&mut self) -> std::result::Result<(), EngineError> {
        self.handle.close().await
    }
}
