//! Prefix expansion
//!
//! Splits an announced prefix into fixed-granularity sub-prefixes: /24 for
//! IPv4 and /48 for IPv6. A prefix already at or finer than the target
//! granularity expands to exactly itself. The candidates of one expansion are
//! disjoint and together cover the original network.

use crate::error::{IngestError, IngestResult};
use ipnet::{IpNet, IpSubnets};
use serde::Serialize;
use std::net::IpAddr;

/// Target prefix length for IPv4 expansion
pub const IPV4_GRANULARITY: u8 = 24;

/// Target prefix length for IPv6 expansion
pub const IPV6_GRANULARITY: u8 = 48;

/// One fixed-granularity sub-prefix of an announcement
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ExpandedPrefixCandidate {
    pub prefix: IpNet,
    pub origin_asn: u32,
    pub source_code: String,
}

impl ExpandedPrefixCandidate {
    pub fn ip_version(&self) -> u8 {
        match self.prefix {
            IpNet::V4(_) => 4,
            IpNet::V6(_) => 6,
        }
    }
}

/// IP version of a textual prefix: anything with a colon is IPv6.
pub fn ip_version(prefix: &str) -> u8 {
    if prefix.contains(':') {
        6
    } else {
        4
    }
}

/// Parse a textual prefix into its network, clearing any host bits.
///
/// A bare address is accepted as a host prefix (/32 or /128).
pub fn parse_prefix(prefix: &str) -> IngestResult<IpNet> {
    let trimmed = prefix.trim();
    let net = match trimmed.parse::<IpNet>() {
        Ok(net) => net,
        Err(net_err) => {
            let addr = trimmed
                .parse::<IpAddr>()
                .map_err(|_| IngestError::InvalidPrefix {
                    prefix: prefix.to_string(),
                    reason: net_err.to_string(),
                })?;
            let max_len = match addr {
                IpAddr::V4(_) => 32,
                IpAddr::V6(_) => 128,
            };
            IpNet::new(addr, max_len).map_err(|e| IngestError::InvalidPrefix {
                prefix: prefix.to_string(),
                reason: e.to_string(),
            })?
        }
    };
    Ok(net.trunc())
}

/// Granularity the expansion of `net` stops at
fn target_len(net: &IpNet) -> u8 {
    let granularity = match net {
        IpNet::V4(_) => IPV4_GRANULARITY,
        IpNet::V6(_) => IPV6_GRANULARITY,
    };
    granularity.max(net.prefix_len())
}

/// Lazy iterator over the candidates of one prefix
pub struct Expansion {
    subnets: IpSubnets,
    origin_asn: u32,
    source_code: String,
    len: u128,
}

impl Expansion {
    /// Number of candidates the expansion yields in total
    pub fn candidate_count(&self) -> u128 {
        self.len
    }
}

impl Iterator for Expansion {
    type Item = ExpandedPrefixCandidate;

    fn next(&mut self) -> Option<Self::Item> {
        self.subnets.next().map(|prefix| ExpandedPrefixCandidate {
            prefix,
            origin_asn: self.origin_asn,
            source_code: self.source_code.clone(),
        })
    }
}

/// Expand an already parsed network.
pub fn expand_network(net: IpNet, origin_asn: u32, source_code: &str) -> IngestResult<Expansion> {
    let net = net.trunc();
    let target = target_len(&net);
    let subnets = net
        .subnets(target)
        .map_err(|e| IngestError::InvalidPrefix {
            prefix: net.to_string(),
            reason: e.to_string(),
        })?;

    Ok(Expansion {
        subnets,
        origin_asn,
        source_code: source_code.to_string(),
        len: 1u128 << (target - net.prefix_len()),
    })
}

/// Expand a textual prefix announced by `origin_asn` through `source_code`.
///
/// Deterministic and free of side effects. Fails with
/// [`IngestError::InvalidPrefix`] if the prefix does not parse.
pub fn expand_prefix(prefix: &str, origin_asn: u32, source_code: &str) -> IngestResult<Expansion> {
    expand_network(parse_prefix(prefix)?, origin_asn, source_code)
}
