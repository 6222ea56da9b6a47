use std::path::PathBuf;

use thiserror::Error;

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading or reading configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// A value failed validation.
    #[error("invalid value for {key}: {reason}")]
    Invalid {
        /// The configuration key.
        key: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// A required key is absent or empty.
    #[error("missing required configuration key {0}")]
    Missing(&'static str),

    /// The configuration file is not valid YAML for this schema.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The configuration file could not be read.
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        /// The file that was read.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A transport URL could not be built.
    #[error("failed to build transport url: {0}")]
    Url(#[from] url::ParseError),
}
