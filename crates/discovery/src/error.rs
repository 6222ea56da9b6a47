use thiserror::Error;

/// Result type for discovery setup.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while setting up discovery.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum Error {
    /// No port pairs to scan.
    #[error("at least one port pair must be scanned")]
    NoPortPairs,

    /// The scanned range runs past the last port.
    #[error("port pairs starting at {base} (count {count}) exceed port 65535")]
    PortRangeOverflow {
        /// First peer port.
        base: u16,
        /// Number of pairs.
        count: usize,
    },
}
