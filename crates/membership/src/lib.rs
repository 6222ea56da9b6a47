//! Decides whether a node founds a cluster or joins one, and registers it
//! with the running cluster when joining.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod client;
mod error;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use client::{AdminClient, AdminConnector, MemberRecord};
pub use error::{AdminError, Error, Result};

use std::time::Duration;

use minicluster_topology::{ClusterMember, DiscoveredPeer, InitialMembership, NodeIdentity};
use tracing::{debug, info};
use url::Url;

/// Default bound on connecting to discovered peers.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolves the initial membership of a starting node.
#[derive(Clone, Debug)]
pub struct ClusterJoinCoordinator<C>
where
    C: AdminConnector,
{
    connector: C,
    dial_timeout: Duration,
}

impl<C> ClusterJoinCoordinator<C>
where
    C: AdminConnector,
{
    /// Creates a coordinator that opens clients through `connector`.
    pub const fn new(connector: C, dial_timeout: Duration) -> Self {
        Self {
            connector,
            dial_timeout,
        }
    }

    /// Resolves how `identity` enters the cluster.
    ///
    /// With no discovered peers the node founds a new cluster and the
    /// result is empty. Otherwise the existing members are read from the
    /// first reachable peer and `identity` is registered as a new member
    /// before returning, so the engine can then start as `existing`.
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicatePeer`] if a peer already runs on this node's peer URL.
    /// - [`Error::Connect`] if no peer answers within the dial timeout.
    /// - [`Error::MembershipQuery`] if the member list cannot be read or a
    ///   member has no peer or client URL.
    /// - [`Error::MembershipRegister`] if registering this node fails.
    pub async fn bootstrap(
        &self,
        identity: &NodeIdentity,
        discovered: &[DiscoveredPeer],
    ) -> Result<InitialMembership> {
        if discovered.is_empty() {
            info!("no nodes found, bootstrapping cluster");
            return Ok(InitialMembership::founding());
        }

        for peer in discovered {
            info!(peer_url = %peer.peer_url, client_url = %peer.client_url, "found node");

            if peer.peer_url == *identity.peer_url() {
                return Err(Error::DuplicatePeer(peer.peer_url.clone()));
            }
        }

        let endpoints: Vec<Url> = discovered.iter().map(|p| p.client_url.clone()).collect();

        let client = tokio::time::timeout(
            self.dial_timeout,
            self.connector.connect(&endpoints, self.dial_timeout),
        )
        .await
        .map_err(|_| Error::Connect(AdminError::Timeout(self.dial_timeout)))?
        .map_err(Error::Connect)?;

        let members = client
            .list_members()
            .await
            .map_err(Error::MembershipQuery)?
            .into_iter()
            .map(cluster_member)
            .collect::<Result<Vec<_>>>()?;

        for member in &members {
            debug!(id = %member.id, name = %member.name, peer_url = %member.peer_url, "existing member");
        }

        let added = client
            .add_member(identity.peer_url())
            .await
            .map_err(|source| Error::MembershipRegister {
                peer_url: identity.peer_url().clone(),
                source,
            })?;

        info!(
            id = %added.id,
            peer_url = %identity.peer_url(),
            "registered with cluster of {} member(s)",
            members.len()
        );

        Ok(InitialMembership::joining(members))
    }
}

fn cluster_member(record: MemberRecord) -> Result<ClusterMember> {
    let incomplete = |missing: &str| {
        Error::MembershipQuery(AdminError::Decode(format!(
            "member {} ({:?}) reports no {missing} url",
            record.id, record.name
        )))
    };

    let peer_url = record
        .peer_urls
        .first()
        .cloned()
        .ok_or_else(|| incomplete("peer"))?;
    let client_url = record
        .client_urls
        .first()
        .cloned()
        .ok_or_else(|| incomplete("client"))?;

    Ok(ClusterMember {
        id: record.id,
        name: record.name,
        peer_url,
        client_url,
    })
}
