//! Identity of the node running this process

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::cluster_entry;

/// Identity of the local node.
///
/// Built once per process from configuration. The engine-assigned `id` is
/// absent until the engine reports readiness; [`NodeIdentity::with_id`]
/// returns a new snapshot carrying it instead of mutating in place.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct NodeIdentity {
    id: Option<String>,
    name: String,
    cluster_name: String,
    peer_url: Url,
    client_url: Url,
    data_dir: PathBuf,
}

impl NodeIdentity {
    /// Creates an identity whose data directory is `<data_root>/<name>`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        cluster_name: impl Into<String>,
        peer_url: Url,
        client_url: Url,
        data_root: impl AsRef<Path>,
    ) -> Self {
        let name = name.into();
        let data_dir = data_root.as_ref().join(&name);

        Self {
            id: None,
            name,
            cluster_name: cluster_name.into(),
            peer_url,
            client_url,
            data_dir,
        }
    }

    /// Returns a snapshot of this identity carrying the engine-assigned id.
    #[must_use]
    pub fn with_id(self, id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..self
        }
    }

    /// The engine-assigned member id, once the engine is ready.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Operator-assigned node name, unique cluster-wide.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the cluster this node founds or joins.
    #[must_use]
    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    /// Address used for consensus traffic.
    #[must_use]
    pub const fn peer_url(&self) -> &Url {
        &self.peer_url
    }

    /// Address used for client and administrative traffic.
    #[must_use]
    pub const fn client_url(&self) -> &Url {
        &self.client_url
    }

    /// Engine data directory.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// This node's `name=peerURL` entry in an initial-cluster string.
    #[must_use]
    pub fn cluster_entry(&self) -> String {
        cluster_entry(&self.name, &self.peer_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> NodeIdentity {
        NodeIdentity::new(
            "n1",
            "demo",
            Url::parse("http://127.0.0.1:9300").unwrap(),
            Url::parse("http://127.0.0.1:9301").unwrap(),
            "data",
        )
    }

    #[test]
    fn data_dir_is_derived_from_name() {
        assert_eq!(identity().data_dir(), Path::new("data/n1"));
    }

    #[test]
    fn id_is_bound_by_snapshot() {
        let created = identity();
        assert_eq!(created.id(), None);

        let running = created.clone().with_id("8e9e05c52164694d");
        assert_eq!(running.id(), Some("8e9e05c52164694d"));
        assert_eq!(running.name(), created.name());
        assert_eq!(created.id(), None);
    }

    #[test]
    fn cluster_entry_uses_bare_url() {
        assert_eq!(identity().cluster_entry(), "n1=http://127.0.0.1:9300");
    }
}
