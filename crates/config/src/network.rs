//! Resolution of `network.host`

use std::net::{IpAddr, Ipv4Addr};

use crate::error::{Error, Result};

/// Alias for the loopback address.
pub const LOCAL_ALIAS: &str = "_local_";

/// Alias for a site-local address.
pub const SITE_ALIAS: &str = "_site_";

/// Alias for a globally routable address.
pub const GLOBAL_ALIAS: &str = "_global_";

/// Resolves a literal IP address or one of the symbolic aliases.
///
/// # Errors
///
/// Returns an error if `value` is neither an alias nor an IP address.
pub fn resolve_host(value: &str) -> Result<IpAddr> {
    match value {
        LOCAL_ALIAS => Ok(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        SITE_ALIAS => Ok(IpAddr::V4(Ipv4Addr::new(192, 168, 0, 1))),
        GLOBAL_ALIAS => Ok(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))),
        literal => literal.parse().map_err(|_| Error::Invalid {
            key: "network.host",
            reason: format!("{literal:?} is not an IP address or one of _local_, _site_, _global_"),
        }),
    }
}
