//! Raw path normalization
//!
//! [`PathNormalizer`] turns one [`RawPath`] into a [`CanonicalPath`]. Every
//! field is decoded on its own, so a broken attribute only costs that field:
//!
//! | Field | Source | Fallback |
//! |-------|--------|----------|
//! | `prefix` | NLRI `IPAddressPrefix` | none, the path is discarded |
//! | `next_hops` | `MpReachNLRIAttribute`, then `NextHopAttribute` | empty |
//! | `asn_path` | first segment of `AsPathAttribute` | local-origin heuristic |
//! | `communities` | `CommunitiesAttribute` | empty |
//! | `age` | seconds since received | fetch time |

use super::attribute::{AttributeDecoder, FieldDecodeError, MatchMode, PathAttribute};
use super::path::CanonicalPath;
use crate::speaker::RawPath;
use chrono::{DateTime, TimeDelta, Utc};
use ipnet::IpNet;
use std::fmt;
use std::net::IpAddr;
use std::slice;
use tracing::{debug, warn};

/// Reasons a raw path cannot be turned into a canonical record at all
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathDiscardError {
    /// No address-prefix envelope, or it could not be decoded
    MissingPrefix(String),
    /// The prefix could not be built into a network of a known family
    InvalidPrefix(String),
}

impl fmt::Display for PathDiscardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathDiscardError::MissingPrefix(e) => write!(f, "missing prefix: {}", e),
            PathDiscardError::InvalidPrefix(e) => write!(f, "invalid prefix: {}", e),
        }
    }
}

impl std::error::Error for PathDiscardError {}

/// Builds canonical records out of raw speaker paths
#[derive(Debug, Clone, Default)]
pub struct PathNormalizer {
    local_asn: u32,
    local_aggregates: Vec<IpNet>,
}

impl PathNormalizer {
    /// Create a normalizer for a network announcing `local_aggregates` from `local_asn`
    pub fn new(local_asn: u32, local_aggregates: Vec<IpNet>) -> Self {
        Self {
            local_asn,
            local_aggregates,
        }
    }

    /// Normalize one path; `fetched_at` anchors the relative age
    pub fn normalize(
        &self,
        raw: &RawPath,
        fetched_at: DateTime<Utc>,
    ) -> Result<CanonicalPath, PathDiscardError> {
        let prefix = decode_prefix(raw)?;
        let label = format!("{} via {}", prefix, raw.neighbor_ip);

        let next_hops = decode_next_hops(raw).unwrap_or_else(|e| {
            warn!("{}: {}, using no next hops", label, e);
            vec![]
        });

        let asn_path = match decode_asn_path(raw) {
            Ok(asn_path) => asn_path,
            Err(e) => {
                let fallback = self.local_origin(&prefix);
                warn!("{}: {}, using {:?}", label, e, fallback);
                fallback
            }
        };

        let communities = decode_communities(raw).unwrap_or_else(|e| {
            warn!("{}: {}, using no communities", label, e);
            vec![]
        });

        let age = decode_age(raw.age_secs, fetched_at).unwrap_or_else(|e| {
            warn!("{}: {}, using fetch time", label, e);
            fetched_at
        });

        // The speaker's own notion of the source ASN is only a cross-check;
        // canonical records derive it from the AS path.
        if raw.source_asn != 0 {
            if let Some(first) = asn_path.first() {
                if *first != raw.source_asn {
                    debug!(
                        "{}: speaker reports source AS{} but AS path starts with AS{}",
                        label, raw.source_asn, first
                    );
                }
            }
        }

        Ok(CanonicalPath {
            prefix,
            next_hops,
            asn_path,
            communities,
            neighbor: raw.neighbor_ip.clone(),
            source_id: raw.source_id.clone(),
            age,
        })
    }

    /// AS path assumed for a prefix without one
    ///
    /// Prefixes inside a configured local aggregate are attributed to the
    /// local ASN; anything else gets an empty path.
    pub fn local_origin(&self, prefix: &IpNet) -> Vec<u32> {
        if self.local_aggregates.iter().any(|agg| agg.contains(prefix)) {
            vec![self.local_asn]
        } else {
            vec![]
        }
    }
}

fn decode_prefix(raw: &RawPath) -> Result<IpNet, PathDiscardError> {
    let nlri = raw
        .nlri
        .as_ref()
        .ok_or_else(|| PathDiscardError::MissingPrefix("path has no NLRI".to_string()))?;

    let attr = AttributeDecoder::decode(slice::from_ref(nlri), "IPAddressPrefix", MatchMode::Substring)
        .map_err(PathDiscardError::MissingPrefix)?;

    let Some(PathAttribute::AddressPrefix(prefix)) = attr else {
        return Err(PathDiscardError::MissingPrefix(format!(
            "NLRI is {}, not an address prefix",
            nlri.type_url
        )));
    };

    let addr = prefix
        .prefix
        .parse::<IpAddr>()
        .map_err(|e| PathDiscardError::InvalidPrefix(format!("{}: {}", prefix.prefix, e)))?;
    let len = u8::try_from(prefix.prefix_len).map_err(|_| {
        PathDiscardError::InvalidPrefix(format!("{}/{}", prefix.prefix, prefix.prefix_len))
    })?;

    // non-strict: host bits set in the address are dropped
    IpNet::new(addr, len)
        .map(|net| net.trunc())
        .map_err(|e| PathDiscardError::InvalidPrefix(format!("{}/{}: {}", addr, len, e)))
}

fn decode_next_hops(raw: &RawPath) -> Result<Vec<IpAddr>, FieldDecodeError> {
    let field = "next_hops";

    // a broken MP-reach attribute only loses its own next hops
    match AttributeDecoder::decode(&raw.pattrs, "MpReachNLRIAttribute", MatchMode::Substring) {
        Ok(Some(PathAttribute::MpReach(attr))) => {
            let hops = parse_addrs(&attr.next_hops);
            if !hops.is_empty() {
                return Ok(hops);
            }
        }
        Ok(_) => {}
        Err(e) => warn!("{}, trying the legacy next hop", FieldDecodeError::new(field, e)),
    }

    match AttributeDecoder::decode(&raw.pattrs, "NextHopAttribute", MatchMode::Substring)
        .map_err(|e| FieldDecodeError::new(field, e))?
    {
        Some(PathAttribute::NextHop(attr)) => {
            let hops = parse_addrs(slice::from_ref(&attr.next_hop));
            if hops.is_empty() {
                Err(FieldDecodeError::new(
                    field,
                    format!("unparseable next hop '{}'", attr.next_hop),
                ))
            } else {
                Ok(hops)
            }
        }
        _ => Err(FieldDecodeError::new(field, "no next-hop attribute")),
    }
}

fn parse_addrs(values: &[String]) -> Vec<IpAddr> {
    values
        .iter()
        .filter_map(|v| match v.parse::<IpAddr>() {
            Ok(addr) => Some(addr),
            Err(_) => {
                debug!("skipping unparseable next hop '{}'", v);
                None
            }
        })
        .collect()
}

fn decode_asn_path(raw: &RawPath) -> Result<Vec<u32>, FieldDecodeError> {
    let field = "asn_path";

    match AttributeDecoder::decode(&raw.pattrs, "AsPathAttribute", MatchMode::Substring)
        .map_err(|e| FieldDecodeError::new(field, e))?
    {
        Some(PathAttribute::AsPath(attr)) => match attr.segments.first() {
            Some(segment) if !segment.numbers.is_empty() => Ok(segment.numbers.clone()),
            Some(_) => Err(FieldDecodeError::new(field, "first AS path segment is empty")),
            None => Err(FieldDecodeError::new(field, "AS path has no segments")),
        },
        _ => Err(FieldDecodeError::new(field, "no AS path attribute")),
    }
}

fn decode_communities(raw: &RawPath) -> Result<Vec<u32>, FieldDecodeError> {
    match AttributeDecoder::decode(&raw.pattrs, "CommunitiesAttribute", MatchMode::Substring)
        .map_err(|e| FieldDecodeError::new("communities", e))?
    {
        Some(PathAttribute::Communities(attr)) => Ok(attr.communities),
        // no communities attached is the common case, not a failure
        _ => Ok(vec![]),
    }
}

fn decode_age(age_secs: i64, fetched_at: DateTime<Utc>) -> Result<DateTime<Utc>, FieldDecodeError> {
    if age_secs < 0 {
        return Err(FieldDecodeError::new(
            "age",
            format!("negative age {}", age_secs),
        ));
    }
    TimeDelta::try_seconds(age_secs)
        .and_then(|delta| fetched_at.checked_sub_signed(delta))
        .ok_or_else(|| FieldDecodeError::new("age", format!("age {}s out of range", age_secs)))
}
