//! Finds peers that may already be running on the configured seed hosts.
//!
//! Without further configuration a node scans ports 9300, 9302, 9304, 9306
//! and 9308 for peer traffic and the port right after each for client
//! traffic. A seed host counts as running a peer on a pair only when both
//! ports are already bound there.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod ports;
mod probe;

pub use error::{Error, Result};
pub use ports::{
    DEFAULT_BASE_PORT, DEFAULT_PAIR_COUNT, PAIR_STRIDE, PortPair, default_port_pairs, port_pairs,
};
#[cfg(any(test, feature = "test-helpers"))]
pub use probe::StaticProbe;
pub use probe::{BindProbe, PortProbe, ProbeOutcome, ProbePolicy};

use minicluster_topology::DiscoveredPeer;
use tracing::{debug, info, warn};
use url::Url;

/// Scans seed hosts for occupied port pairs.
#[derive(Clone, Debug)]
pub struct PeerDiscoverer<P = BindProbe>
where
    P: PortProbe,
{
    policy: ProbePolicy,
    port_pairs: Vec<PortPair>,
    probe: P,
}

impl<P> PeerDiscoverer<P>
where
    P: PortProbe,
{
    /// Creates a discoverer with a custom probe and port pairs.
    #[must_use]
    pub const fn with_probe(probe: P, port_pairs: Vec<PortPair>, policy: ProbePolicy) -> Self {
        Self {
            policy,
            port_pairs,
            probe,
        }
    }

    /// The pairs scanned on every host, in scan order.
    #[must_use]
    pub fn port_pairs(&self) -> &[PortPair] {
        &self.port_pairs
    }

    /// Returns a peer for every (pair, seed host) whose two ports are occupied.
    ///
    /// Pairs are the outer loop and hosts the inner one; the order carries no
    /// meaning beyond logging.
    pub fn discover<S>(&self, seed_hosts: &[S]) -> Vec<DiscoveredPeer>
    where
        S: AsRef<str>,
    {
        let mut peers = Vec::new();

        for pair in &self.port_pairs {
            for host in seed_hosts {
                let host = host.as_ref();

                // Client port is only probed when the peer port is taken
                if !self.occupied(host, pair.peer) || !self.occupied(host, pair.client) {
                    continue;
                }

                match peer_at(host, *pair) {
                    Ok(peer) => {
                        debug!(peer_url = %peer.peer_url, "port pair occupied");
                        peers.push(peer);
                    }
                    Err(e) => {
                        warn!(host, peer_port = pair.peer, "skipping unparseable peer address: {}", e);
                    }
                }
            }
        }

        info!(
            "discovery found {} candidate peer(s) on {} seed host(s)",
            peers.len(),
            seed_hosts.len()
        );

        peers
    }

    fn occupied(&self, host: &str, port: u16) -> bool {
        let outcome = self.probe.probe(host, port);

        if let ProbeOutcome::Unavailable(kind) = outcome {
            warn!(
                host,
                port,
                ?kind,
                policy = ?self.policy,
                "bind failed for a reason other than address in use"
            );
        }

        self.policy.is_occupied(outcome)
    }
}

fn peer_at(host: &str, pair: PortPair) -> std::result::Result<DiscoveredPeer, url::ParseError> {
    Ok(DiscoveredPeer {
        peer_url: Url::parse(&format!("http://{}:{}", host, pair.peer))?,
        client_url: Url::parse(&format!("http://{}:{}", host, pair.client))?,
    })
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    fn discoverer(probe: StaticProbe, policy: ProbePolicy) -> PeerDiscoverer<StaticProbe> {
        PeerDiscoverer::with_probe(probe, default_port_pairs(), policy)
    }

    #[test]
    fn quiet_host_yields_nothing() {
        let peers = discoverer(StaticProbe::new(), ProbePolicy::Lenient).discover(&["127.0.0.1"]);

        assert!(peers.is_empty());
    }

    #[test]
    fn one_occupied_pair_yields_one_peer() {
        let probe = StaticProbe::new().occupied("127.0.0.1", 9304, 9305);
        let peers = discoverer(probe, ProbePolicy::Lenient).discover(&["127.0.0.1"]);

        assert_eq!(
            peers,
            vec![DiscoveredPeer {
                peer_url: Url::parse("http://127.0.0.1:9304").unwrap(),
                client_url: Url::parse("http://127.0.0.1:9305").unwrap(),
            }]
        );
    }

    #[test]
    fn half_occupied_pair_is_not_a_peer() {
        let probe = StaticProbe::new().with("127.0.0.1", 9300, ProbeOutcome::InUse);
        let peers = discoverer(probe, ProbePolicy::Lenient).discover(&["127.0.0.1"]);

        assert!(peers.is_empty());
    }

    #[test]
    fn pairs_are_the_outer_loop() {
        let probe = StaticProbe::new()
            .occupied("10.0.0.2", 9300, 9301)
            .occupied("10.0.0.1", 9302, 9303)
            .occupied("10.0.0.1", 9300, 9301);
        let peers =
            discoverer(probe, ProbePolicy::Lenient).discover(&["10.0.0.1", "10.0.0.2"]);

        let order: Vec<String> = peers.iter().map(|p| p.peer_url.to_string()).collect();
        assert_eq!(
            order,
            vec![
                "http://10.0.0.1:9300/",
                "http://10.0.0.2:9300/",
                "http://10.0.0.1:9302/",
            ]
        );
    }

    #[tracing_test::traced_test]
    #[test]
    fn strict_policy_ignores_unbindable_hosts() {
        let denied = ProbeOutcome::Unavailable(io::ErrorKind::AddrNotAvailable);
        let probe = StaticProbe::new()
            .with("192.0.2.10", 9300, denied)
            .with("192.0.2.10", 9301, denied);

        assert_eq!(
            discoverer(probe.clone(), ProbePolicy::Lenient)
                .discover(&["192.0.2.10"])
                .len(),
            1
        );
        assert!(
            discoverer(probe, ProbePolicy::Strict)
                .discover(&["192.0.2.10"])
                .is_empty()
        );
        assert!(logs_contain("bind failed for a reason other than address in use"));
    }
}
