//! The fixed set of port pairs a node scans for peers

use crate::error::{Error, Result};

/// First peer port scanned by default.
pub const DEFAULT_BASE_PORT: u16 = 9300;

/// Number of pairs scanned by default.
pub const DEFAULT_PAIR_COUNT: usize = 5;

/// Distance between the peer ports of two consecutive pairs.
pub const PAIR_STRIDE: u16 = 2;

/// A peer port and the client port right after it.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct PortPair {
    /// Port carrying consensus traffic.
    pub peer: u16,

    /// Port carrying client traffic (`peer + 1`).
    pub client: u16,
}

/// Builds `count` pairs starting at `base`, each two ports apart.
///
/// # Errors
///
/// Returns an error if `count` is zero or the last client port would exceed 65535.
pub fn port_pairs(base: u16, count: usize) -> Result<Vec<PortPair>> {
    if count == 0 {
        return Err(Error::NoPortPairs);
    }

    (0..count)
        .map(|i| {
            let offset = u16::try_from(i)
                .ok()
                .and_then(|i| i.checked_mul(PAIR_STRIDE))
                .ok_or(Error::PortRangeOverflow { base, count })?;
            let peer = base
                .checked_add(offset)
                .ok_or(Error::PortRangeOverflow { base, count })?;
            let client = peer
                .checked_add(1)
                .ok_or(Error::PortRangeOverflow { base, count })?;

            Ok(PortPair { peer, client })
        })
        .collect()
}

/// 9300/9301, 9302/9303, 9304/9305, 9306/9307, 9308/9309.
#[must_use]
pub fn default_port_pairs() -> Vec<PortPair> {
    (0..5u16)
        .map(|i| PortPair {
            peer: DEFAULT_BASE_PORT + i * PAIR_STRIDE,
            client: DEFAULT_BASE_PORT + i * PAIR_STRIDE + 1,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pairs_match_reference_ports() {
        let pairs: Vec<(u16, u16)> = default_port_pairs()
            .into_iter()
            .map(|p| (p.peer, p.client))
            .collect();

        assert_eq!(
            pairs,
            vec![(9300, 9301), (9302, 9303), (9304, 9305), (9306, 9307), (9308, 9309)]
        );
        assert_eq!(
            port_pairs(DEFAULT_BASE_PORT, DEFAULT_PAIR_COUNT).unwrap(),
            default_port_pairs()
        );
    }

    #[test]
    fn rejects_empty_and_overflowing_ranges() {
        assert_eq!(port_pairs(9300, 0), Err(Error::NoPortPairs));
        assert_eq!(
            port_pairs(65530, 5),
            Err(Error::PortRangeOverflow {
                base: 65530,
                count: 5
            })
        );
        assert_eq!(port_pairs(65532, 2).unwrap().last().unwrap().client, 65535);
    }
}
