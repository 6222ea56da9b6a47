//! Discovered peers and resolved cluster membership

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{NodeIdentity, cluster_entry};

/// A port pair found occupied on a seed host. Only addresses are known at
/// this stage; the peer's name is learned from the cluster itself.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredPeer {
    /// Consensus address of the peer.
    pub peer_url: Url,

    /// Client address of the peer.
    pub client_url: Url,
}

/// A member of an existing cluster, as reported by one live peer.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ClusterMember {
    /// Engine-assigned member id.
    pub id: String,

    /// Member name.
    pub name: String,

    /// First advertised peer URL.
    pub peer_url: Url,

    /// First advertised client URL.
    pub client_url: Url,
}

impl ClusterMember {
    /// This member's `name=peerURL` entry in an initial-cluster string.
    #[must_use]
    pub fn cluster_entry(&self) -> String {
        cluster_entry(&self.name, &self.peer_url)
    }
}

/// Whether the engine founds a cluster or joins one.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterState {
    /// This node founds the cluster.
    New,

    /// This node joins a running cluster.
    Existing,
}

impl ClusterState {
    /// The flag value understood by the engine.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Existing => "existing",
        }
    }
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Members of the cluster this node is joining, excluding the node itself.
///
/// Empty exactly when the node founds a new cluster. Used once to render the
/// engine's initial-cluster string and dropped after the engine starts.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct InitialMembership {
    members: Vec<ClusterMember>,
}

impl InitialMembership {
    /// Membership for a node that founds its cluster.
    #[must_use]
    pub const fn founding() -> Self {
        Self {
            members: Vec::new(),
        }
    }

    /// Membership for a node joining the given existing members.
    #[must_use]
    pub const fn joining(members: Vec<ClusterMember>) -> Self {
        Self { members }
    }

    /// Existing members, in the order the cluster reported them.
    #[must_use]
    pub fn members(&self) -> &[ClusterMember] {
        &self.members
    }

    /// Whether there are no existing members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Number of existing members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// `new` when empty, `existing` otherwise.
    #[must_use]
    pub fn cluster_state(&self) -> ClusterState {
        if self.members.is_empty() {
            ClusterState::New
        } else {
            ClusterState::Existing
        }
    }

    /// Renders the initial-cluster string: `own` first, then each existing
    /// member in order, joined by commas.
    #[must_use]
    pub fn initial_cluster(&self, own: &NodeIdentity) -> String {
        std::iter::once(own.cluster_entry())
            .chain(self.members.iter().map(ClusterMember::cluster_entry))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn own() -> NodeIdentity {
        NodeIdentity::new(
            "n1",
            "demo",
            Url::parse("http://127.0.0.1:9300").unwrap(),
            Url::parse("http://127.0.0.1:9301").unwrap(),
            "data",
        )
    }

    fn member(name: &str, peer_port: u16) -> ClusterMember {
        ClusterMember {
            id: format!("{name}-id"),
            name: name.to_string(),
            peer_url: Url::parse(&format!("http://127.0.0.1:{peer_port}")).unwrap(),
            client_url: Url::parse(&format!("http://127.0.0.1:{}", peer_port + 1)).unwrap(),
        }
    }

    #[test]
    fn founding_membership_is_new() {
        let membership = InitialMembership::founding();

        assert!(membership.is_empty());
        assert_eq!(membership.cluster_state(), ClusterState::New);
        assert_eq!(membership.initial_cluster(&own()), "n1=http://127.0.0.1:9300");
    }

    #[test]
    fn self_comes_first_in_initial_cluster() {
        let membership = InitialMembership::joining(vec![member("n0", 9200)]);

        assert_eq!(membership.cluster_state(), ClusterState::Existing);
        assert_eq!(
            membership.initial_cluster(&own()),
            "n1=http://127.0.0.1:9300,n0=http://127.0.0.1:9200"
        );
    }

    #[test]
    fn members_keep_reported_order() {
        let membership =
            InitialMembership::joining(vec![member("n2", 9304), member("n0", 9200)]);

        assert_eq!(
            membership.initial_cluster(&own()),
            "n1=http://127.0.0.1:9300,n2=http://127.0.0.1:9304,n0=http://127.0.0.1:9200"
        );
    }
}
