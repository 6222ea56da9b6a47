//! Lifecycle of a cluster node: discover peers, resolve membership, start the
//! engine, and leave the cluster again on shutdown.
//!
//! Each phase is its own type. [`Node::bootstrap`] yields a
//! [`BootstrappedNode`], whose [`BootstrappedNode::start`] yields a
//! [`RunningNode`]; the engine-assigned id only exists on the latter.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod builder;
mod error;
mod phase;

pub use builder::NodeBuilder;
pub use error::{Error, Result};
pub use phase::Phase;

use std::sync::Arc;
use std::time::Duration;

use minicluster_discovery::{BindProbe, PeerDiscoverer, PortProbe};
use minicluster_engine::{Engine, EngineError, EngineHandle, EngineSupervisor, RunningEngine};
use minicluster_membership::{AdminConnector, ClusterJoinCoordinator};
use minicluster_topology::{InitialMembership, NodeIdentity};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// How hard a node tries to remove itself from the cluster on shutdown.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RemovalPolicy {
    /// Attempts before giving up; at least one is always made.
    pub attempts: u32,

    /// Pause between attempts.
    pub backoff: Duration,

    /// Whether giving up fails the run.
    pub required: bool,
}

impl Default for RemovalPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(500),
            required: false,
        }
    }
}

#[derive(Debug)]
struct PhaseTracker {
    name: String,
    sender: watch::Sender<Phase>,
}

impl PhaseTracker {
    fn new(name: &str) -> Self {
        let (sender, _) = watch::channel(Phase::Created);

        Self {
            name: name.to_string(),
            sender,
        }
    }

    fn set(&self, phase: Phase) {
        info!(node = %self.name, %phase, "node phase changed");
        self.sender.send_replace(phase);
    }

    fn subscribe(&self) -> watch::Receiver<Phase> {
        self.sender.subscribe()
    }
}

/// A configured node that has not contacted anything yet.
pub struct Node<C, E, P = BindProbe>
where
    C: AdminConnector,
    E: Engine,
    P: PortProbe,
{
    identity: NodeIdentity,
    seed_hosts: Vec<String>,
    discoverer: Arc<PeerDiscoverer<P>>,
    coordinator: ClusterJoinCoordinator<C>,
    supervisor: EngineSupervisor<E>,
    removal: RemovalPolicy,
    phase: PhaseTracker,
}

impl<C, E, P> Node<C, E, P>
where
    C: AdminConnector,
    E: Engine,
    P: PortProbe,
{
    /// Starts building a node.
    #[must_use]
    pub fn builder() -> NodeBuilder<C, E, P> {
        NodeBuilder::new()
    }

    pub(crate) fn new(
        identity: NodeIdentity,
        seed_hosts: Vec<String>,
        discoverer: PeerDiscoverer<P>,
        coordinator: ClusterJoinCoordinator<C>,
        supervisor: EngineSupervisor<E>,
        removal: RemovalPolicy,
    ) -> Self {
        let phase = PhaseTracker::new(identity.name());

        Self {
            identity,
            seed_hosts,
            discoverer: Arc::new(discoverer),
            coordinator,
            supervisor,
            removal,
            phase,
        }
    }

    /// The node's identity. Its id is unset at this stage.
    pub const fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    /// Observes every phase this node and its successors pass through.
    pub fn phases(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Bootstraps, starts, then runs until `shutdown` is cancelled or the
    /// engine terminates.
    ///
    /// `shutdown` is only consulted once the engine is running.
    ///
    /// # Errors
    ///
    /// Returns the failure that moved the node to [`Phase::Errored`].
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        self.bootstrap().await?.start().await?.run_until(shutdown).await
    }

    /// Discovers peers and resolves the initial membership, registering
    /// this node with an existing cluster if one is found.
    ///
    /// # Errors
    ///
    /// - [`Error::Discovery`] if the peer scan panics.
    /// - [`Error::Bootstrap`] if membership cannot be resolved.
    pub async fn bootstrap(self) -> Result<BootstrappedNode<C, E, P>> {
        info!(
            node = %self.identity.name(),
            cluster = %self.identity.cluster_name(),
            peer_url = %self.identity.peer_url(),
            client_url = %self.identity.client_url(),
            "bootstrapping node"
        );

        // Port checks bind sockets and may resolve host names
        let discoverer = Arc::clone(&self.discoverer);
        let seed_hosts = self.seed_hosts.clone();
        let discovered =
            match tokio::task::spawn_blocking(move || discoverer.discover(&seed_hosts)).await {
                Ok(discovered) => discovered,
                Err(e) => {
                    error!("peer discovery failed: {}", e);
                    self.phase.set(Phase::Errored);

                    return Err(Error::Discovery(e));
                }
            };

        match self.coordinator.bootstrap(&self.identity, &discovered).await {
            Ok(membership) => {
                self.phase.set(Phase::Bootstrapped);

                Ok(BootstrappedNode {
                    node: self,
                    membership,
                })
            }
            Err(e) => {
                error!("bootstrap failed: {}", e);
                self.phase.set(Phase::Errored);

                Err(e.into())
            }
        }
    }
}

/// A node whose initial membership is known.
pub struct BootstrappedNode<C, E, P = BindProbe>
where
    C: AdminConnector,
    E: Engine,
    P: PortProbe,
{
    node: Node<C, E, P>,
    membership: InitialMembership,
}

impl<C, E, P> BootstrappedNode<C, E, P>
where
    C: AdminConnector,
    E: Engine,
    P: PortProbe,
{
    /// Members of the cluster being joined; empty when founding.
    pub const fn membership(&self) -> &InitialMembership {
        &self.membership
    }

    /// Observes phase changes.
    pub fn phases(&self) -> watch::Receiver<Phase> {
        self.node.phases()
    }

    /// Starts the engine and records the id it assigns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Start`] if the engine fails to start or is not ready
    /// in time.
    pub async fn start(self) -> Result<RunningNode<E::Handle>> {
        let Self { node, membership } = self;

        match node.supervisor.start(&node.identity, &membership).await {
            Ok(engine) => {
                let identity = node.identity.with_id(engine.id());
                node.phase.set(Phase::Running);

                info!(
                    node = %identity.name(),
                    member_id = %engine.id(),
                    cluster_id = %engine.cluster_id(),
                    "node running"
                );

                Ok(RunningNode {
                    identity,
                    engine,
                    removal: node.removal,
                    phase: node.phase,
                })
            }
            Err(e) => {
                error!("engine start failed: {}", e);
                node.phase.set(Phase::Errored);

                Err(e.into())
            }
        }
    }
}

/// A node with a ready engine.
pub struct RunningNode<H>
where
    H: EngineHandle,
{
    identity: NodeIdentity,
    engine: RunningEngine<H>,
    removal: RemovalPolicy,
    phase: PhaseTracker,
}

impl<H> RunningNode<H>
where
    H: EngineHandle,
{
    /// The node's identity, carrying the engine-assigned id.
    pub const fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    /// The id of the cluster the node belongs to.
    pub fn cluster_id(&self) -> &str {
        self.engine.cluster_id()
    }

    /// Observes phase changes.
    pub fn phases(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Runs until `shutdown` is cancelled or the engine terminates.
    ///
    /// On shutdown the node removes itself from the cluster, then stops and
    /// closes the engine, in that order whatever the removal outcome.
    ///
    /// # Errors
    ///
    /// - [`Error::EngineFailed`] if the engine terminates with an error.
    /// - [`Error::SelfRemoval`] if removal fails and the policy requires it.
    /// - [`Error::Stop`] if the engine cannot be stopped.
    pub async fn run_until(mut self, shutdown: CancellationToken) -> Result<()> {
        let terminated = tokio::select! {
            result = self.engine.terminated() => Some(result),
            () = shutdown.cancelled() => None,
        };

        match terminated {
            Some(Ok(())) => {
                info!("engine exited cleanly");
                self.close_engine().await;
                self.phase.set(Phase::Stopped);

                Ok(())
            }
            Some(Err(e)) => {
                error!("engine failed: {}", e);
                self.close_engine().await;
                self.phase.set(Phase::Errored);

                Err(Error::EngineFailed(e))
            }
            None => self.shut_down().await,
        }
    }

    async fn shut_down(mut self) -> Result<()> {
        self.phase.set(Phase::ShuttingDown);

        let removal = self.leave_cluster().await;
        let stopped = self.engine.stop().await;
        self.close_engine().await;

        let result = match (removal, stopped) {
            (Err((attempts, source)), stopped) if self.removal.required => {
                if let Err(e) = stopped {
                    warn!("failed to stop engine: {}", e);
                }

                Err(Error::SelfRemoval { attempts, source })
            }
            (_, Err(e)) => Err(Error::Stop(e)),
            (Err((_, e)), Ok(())) => {
                warn!("shut down without leaving the cluster: {}", e);
                Ok(())
            }
            (Ok(()), Ok(())) => Ok(()),
        };

        if result.is_ok() {
            self.phase.set(Phase::Stopped);
        } else {
            self.phase.set(Phase::Errored);
        }

        result
    }

    async fn leave_cluster(&self) -> std::result::Result<(), (u32, EngineError)> {
        let attempts = self.removal.attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.engine.remove_self().await {
                Ok(()) => {
                    info!(member_id = %self.engine.id(), "removed self from cluster");
                    return Ok(());
                }
                Err(e) if attempt < attempts => {
                    warn!(attempt, "failed to remove self from cluster, retrying: {}", e);
                    tokio::time::sleep(self.removal.backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(attempts, "giving up removing self from cluster: {}", e);
                    return Err((attempt, e));
                }
            }
        }
    }

    async fn close_engine(&mut self) {
        if let Err(e) = self.engine.close().await {
            warn!("failed to close engine: {}", e);
        }
    }
}
