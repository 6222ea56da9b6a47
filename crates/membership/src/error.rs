use thiserror::Error;
use url::Url;

/// Result type for cluster join operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by an administrative client of the consensus engine.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum AdminError {
    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),

    /// The engine answered with an error status.
    #[error("request rejected with status {status}: {message}")]
    Rejected {
        /// HTTP-like status code.
        status: u16,
        /// Body or reason returned by the engine.
        message: String,
    },

    /// No endpoint answered within the allotted time.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The request failed below the application layer.
    #[error("transport error: {0}")]
    Transport(String),

    /// None of the endpoints could be reached.
    #[error("no endpoint reachable among {0:?}")]
    Unreachable(Vec<String>),
}

/// Errors that can occur while deciding how to enter a cluster.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum Error {
    /// Could not connect to any discovered peer.
    #[error("failed to connect to discovered peers: {0}")]
    Connect(#[source] AdminError),

    /// A discovered peer advertises this node's own peer URL.
    #[error("a node is already running on {0}")]
    DuplicatePeer(Url),

    /// Listing the existing members failed.
    #[error("failed to list cluster members: {0}")]
    MembershipQuery(#[source] AdminError),

    /// Registering this node with the cluster failed.
    #[error("failed to register {peer_url} with the cluster: {source}")]
    MembershipRegister {
        /// Peer URL that was being registered.
        peer_url: Url,
        /// Underlying client error.
        #[source]
        source: AdminError,
    },
}
