//! Probing whether a port is already bound on a host

use std::io;
use std::net::TcpListener;

use serde::{Deserialize, Serialize};

/// Result of trying to bind a single port.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProbeOutcome {
    /// The bind succeeded, nothing is listening.
    Free,

    /// The bind failed because the address is in use.
    InUse,

    /// The bind failed for another reason: permission denied, an address
    /// that is not local to this machine, an unresolvable host name.
    Unavailable(io::ErrorKind),
}

/// How bind failures are interpreted.
///
/// A failed bind cannot tell a running peer apart from an unrelated process
/// or from a host this machine cannot bind on at all.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbePolicy {
    /// Any failed bind counts as occupied.
    #[default]
    Lenient,

    /// Only "address in use" counts as occupied.
    Strict,
}

impl ProbePolicy {
    /// Whether `outcome` counts as an occupied port under this policy.
    #[must_use]
    pub const fn is_occupied(self, outcome: ProbeOutcome) -> bool {
        match (self, outcome) {
            (_, ProbeOutcome::Free) | (Self::Strict, ProbeOutcome::Unavailable(_)) => false,
            (_, ProbeOutcome::InUse) | (Self::Lenient, ProbeOutcome::Unavailable(_)) => true,
        }
    }
}

/// Probes ports on a host.
pub trait PortProbe: Send + Sync + 'static {
    /// Probes `port` on `host`.
    fn probe(&self, host: &str, port: u16) -> ProbeOutcome;
}

/// Probes by binding a TCP listener and releasing it immediately.
#[derive(Clone, Copy, Debug, Default)]
pub struct BindProbe;

impl PortProbe for BindProbe {
    fn probe(&self, host: &str, port: u16) -> ProbeOutcome {
        match TcpListener::bind((host, port)) {
            Ok(listener) => {
                drop(listener);
                ProbeOutcome::Free
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => ProbeOutcome::InUse,
            Err(e) => ProbeOutcome::Unavailable(e.kind()),
        }
    }
}

#[cfg(any(test, feature = "test-helpers"))]
pub use static_probe::StaticProbe;

#[cfg(any(test, feature = "test-helpers"))]
mod static_probe {
    use std::collections::HashMap;

    use super::{PortProbe, ProbeOutcome};

    /// Probe answering from a fixed table; unknown ports are free.
    #[derive(Clone, Debug, Default)]
    pub struct StaticProbe {
        outcomes: HashMap<(String, u16), ProbeOutcome>,
    }

    impl StaticProbe {
        /// Creates a probe where every port is free.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Sets the outcome for `port` on `host`.
        #[must_use]
        pub fn with(mut self, host: &str, port: u16, outcome: ProbeOutcome) -> Self {
            self.outcomes.insert((host.to_string(), port), outcome);
            self
        }

        /// Marks both ports of a pair as in use on `host`.
        #[must_use]
        pub fn occupied(self, host: &str, peer: u16, client: u16) -> Self {
            self.with(host, peer, ProbeOutcome::InUse)
                .with(host, client, ProbeOutcome::InUse)
        }
    }

    impl PortProbe for StaticProbe {
        fn probe(&self, host: &str, port: u16) -> ProbeOutcome {
            self.outcomes
                .get(&(host.to_string(), port))
                .copied()
                .unwrap_or(ProbeOutcome::Free)
        }
    }
}
