//! Node builder pattern

use minicluster_discovery::{BindProbe, PeerDiscoverer, PortProbe};
use minicluster_engine::{Engine, EngineSupervisor};
use minicluster_membership::{AdminConnector, ClusterJoinCoordinator};
use minicluster_topology::NodeIdentity;

use crate::error::{Error, Result};
use crate::{Node, RemovalPolicy};

/// Node builder
pub struct NodeBuilder<C, E, P = BindProbe>
where
    C: AdminConnector,
    E: Engine,
    P: PortProbe,
{
    /// Local identity
    identity: Option<NodeIdentity>,

    /// Hosts scanned for peers
    seed_hosts: Option<Vec<String>>,

    /// Peer discovery
    discoverer: Option<PeerDiscoverer<P>>,

    /// Join coordination
    coordinator: Option<ClusterJoinCoordinator<C>>,

    /// Engine supervision
    supervisor: Option<EngineSupervisor<E>>,

    /// Shutdown removal policy
    removal: RemovalPolicy,
}

impl<C, E, P> Default for NodeBuilder<C, E, P>
where
    C: AdminConnector,
    E: Engine,
    P: PortProbe,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<C, E, P> NodeBuilder<C, E, P>
where
    C: AdminConnector,
    E: Engine,
    P: PortProbe,
{
    /// Create a new node builder
    #[must_use]
    pub fn new() -> Self {
        Self {
            identity: None,
            seed_hosts: None,
            discoverer: None,
            coordinator: None,
            supervisor: None,
            removal: RemovalPolicy::default(),
        }
    }

    /// Set identity
    #[must_use]
    pub fn with_identity(mut self, identity: NodeIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Set seed hosts
    #[must_use]
    pub fn with_seed_hosts<I, S>(mut self, seed_hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.seed_hosts = Some(seed_hosts.into_iter().map(Into::into).collect());
        self
    }

    /// Set discoverer
    #[must_use]
    pub fn with_discoverer(mut self, discoverer: PeerDiscoverer<P>) -> Self {
        self.discoverer = Some(discoverer);
        self
    }

    /// Set coordinator
    #[must_use]
    pub fn with_coordinator(mut self, coordinator: ClusterJoinCoordinator<C>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    /// Set supervisor
    #[must_use]
    pub fn with_supervisor(mut self, supervisor: EngineSupervisor<E>) -> Self {
        self.supervisor = Some(supervisor);
        self
    }

    /// Set removal policy
    #[must_use]
    pub const fn with_removal_policy(mut self, removal: RemovalPolicy) -> Self {
        self.removal = removal;
        self
    }

    /// Build the node
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConfigured`] naming the first missing collaborator.
    pub fn build(self) -> Result<Node<C, E, P>> {
        let identity = self.identity.ok_or(Error::NotConfigured("identity"))?;
        let seed_hosts = self.seed_hosts.ok_or(Error::NotConfigured("seed hosts"))?;
        let discoverer = self.discoverer.ok_or(Error::NotConfigured("discoverer"))?;
        let coordinator = self.coordinator.ok_or(Error::NotConfigured("coordinator"))?;
        let supervisor = self.supervisor.ok_or(Error::NotConfigured("supervisor"))?;

        Ok(Node::new(
            identity,
            seed_hosts,
            discoverer,
            coordinator,
            supervisor,
            self.removal,
        ))
    }
}
