//! Node and membership types shared by discovery, bootstrap and the engine.
//!
//! This crate provides:
//! - The bootstrapping node's identity (`NodeIdentity`)
//! - Peers found by port scanning (`DiscoveredPeer`)
//! - The resolved membership of an existing cluster (`ClusterMember`, `InitialMembership`)
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod member;
pub mod node;

pub use member::{ClusterMember, ClusterState, DiscoveredPeer, InitialMembership};
pub use node::NodeIdentity;

use url::Url;

/// Renders a URL the way it appears in initial-cluster strings and
/// endpoint lists: without the trailing `/` that `Url` adds to an empty path.
#[must_use]
pub fn render_url(url: &Url) -> String {
    let rendered = url.as_str();
    if url.path() == "/" && url.query().is_none() && url.fragment().is_none() {
        rendered.trim_end_matches('/').to_string()
    } else {
        rendered.to_string()
    }
}

/// Formats a single `name=peerURL` entry of an initial-cluster string.
#[must_use]
pub fn cluster_entry(name: &str, peer_url: &Url) -> String {
    format!("{}={}", name, render_url(peer_url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_url_drops_root_slash() {
        let url = Url::parse("http://127.0.0.1:9300").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9300/");
        assert_eq!(render_url(&url), "http://127.0.0.1:9300");
    }

    #[test]
    fn render_url_keeps_paths() {
        let url = Url::parse("http://127.0.0.1:9300/raft/").unwrap();
        assert_eq!(render_url(&url), "http://127.0.0.1:9300/raft/");
    }
}
