//! Configuration handed to the engine adapter

use std::path::PathBuf;

use minicluster_topology::{ClusterState, InitialMembership, NodeIdentity};
use serde::{Deserialize, Serialize};
use url::Url;

/// Startup configuration for a consensus engine instance.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Member name.
    pub name: String,

    /// Persistent storage directory.
    pub data_dir: PathBuf,

    /// URLs to accept peer traffic on.
    pub listen_peer_urls: Vec<Url>,

    /// URLs to accept client traffic on.
    pub listen_client_urls: Vec<Url>,

    /// Peer URLs advertised to the rest of the cluster.
    pub advertise_peer_urls: Vec<Url>,

    /// Client URLs advertised to the rest of the cluster.
    pub advertise_client_urls: Vec<Url>,

    /// `name=peerURL` entries, comma separated.
    pub initial_cluster: String,

    /// Token distinguishing this cluster from others on the same network.
    pub initial_cluster_token: String,

    /// Whether the cluster is founded or joined.
    pub initial_cluster_state: ClusterState,
}

impl EngineConfig {
    /// Builds the configuration for `identity` entering `membership`.
    #[must_use]
    pub fn new(identity: &NodeIdentity, membership: &InitialMembership) -> Self {
        let peer_urls = vec![identity.peer_url().clone()];
        let client_urls = vec![identity.client_url().clone()];

        Self {
            name: identity.name().to_string(),
            data_dir: identity.data_dir().to_path_buf(),
            listen_peer_urls: peer_urls.clone(),
            listen_client_urls: client_urls.clone(),
            advertise_peer_urls: peer_urls,
            advertise_client_urls: client_urls,
            initial_cluster: membership.initial_cluster(identity),
            initial_cluster_token: identity.cluster_name().to_string(),
            initial_cluster_state: membership.cluster_state(),
        }
    }
}
