//! Per-family origin AS tallies

use super::path::{AddressFamily, CanonicalPath};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Counts accepted paths per origin ASN, per address family
///
/// Keys are ASNs rendered as strings. One accepted path counts once, so two
/// paths to the same prefix from the same origin count twice.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Aggregator {
    counts: BTreeMap<AddressFamily, BTreeMap<String, u64>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally one accepted path
    ///
    /// Returns `false` when the path has no origin ASN and was not counted.
    pub fn add(&mut self, path: &CanonicalPath) -> bool {
        let family = path.family();
        // make the family show up in reports even when nothing is counted
        let tally = self.counts.entry(family).or_default();

        match path.source_asn() {
            Some(asn) => {
                *tally.entry(asn.to_string()).or_insert(0) += 1;
                true
            }
            None => {
                debug!("{} has no origin ASN, not counted", path.prefix);
                false
            }
        }
    }

    /// Register a family with no paths yet
    pub fn touch(&mut self, family: AddressFamily) {
        self.counts.entry(family).or_default();
    }

    /// Count map of one family
    pub fn counts(&self, family: AddressFamily) -> Option<&BTreeMap<String, u64>> {
        self.counts.get(&family)
    }

    /// Families seen so far, IPv4 first
    pub fn families(&self) -> impl Iterator<Item = AddressFamily> + '_ {
        self.counts.keys().copied()
    }

    /// Number of counted paths in one family
    pub fn total(&self, family: AddressFamily) -> u64 {
        self.counts
            .get(&family)
            .map(|tally| tally.values().sum())
            .unwrap_or(0)
    }

    /// Number of counted paths across all families
    pub fn grand_total(&self) -> u64 {
        self.counts.values().flat_map(|tally| tally.values()).sum()
    }

    /// Number of distinct ASNs in one family
    pub fn asn_count(&self, family: AddressFamily) -> usize {
        self.counts.get(&family).map(|tally| tally.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn path(prefix: &str, asn_path: Vec<u32>) -> CanonicalPath {
        CanonicalPath {
            prefix: prefix.parse().unwrap(),
            next_hops: vec![],
            asn_path,
            communities: vec![],
            neighbor: String::new(),
            source_id: String::new(),
            age: Utc::now(),
        }
    }

    #[test]
    fn test_counts_per_family() {
        let mut agg = Aggregator::new();
        assert!(agg.add(&path("203.0.113.0/24", vec![64500, 64501])));
        assert!(agg.add(&path("198.51.100.0/24", vec![64500])));
        assert!(agg.add(&path("192.0.2.0/24", vec![64502])));
        assert!(agg.add(&path("2001:db8::/32", vec![64500])));

        let v4 = agg.counts(AddressFamily::Ipv4).unwrap();
        assert_eq!(v4.get("64500"), Some(&2));
        assert_eq!(v4.get("64502"), Some(&1));
        assert_eq!(agg.total(AddressFamily::Ipv4), 3);
        assert_eq!(agg.asn_count(AddressFamily::Ipv4), 2);
        assert_eq!(agg.total(AddressFamily::Ipv6), 1);
        assert_eq!(agg.grand_total(), 4);
        assert_eq!(
            agg.families().collect::<Vec<_>>(),
            vec![AddressFamily::Ipv4, AddressFamily::Ipv6]
        );
    }

    #[test]
    fn test_empty_origin_is_skipped() {
        let mut agg = Aggregator::new();
        assert!(!agg.add(&path("203.0.113.0/24", vec![])));
        assert_eq!(agg.total(AddressFamily::Ipv4), 0);
        assert_eq!(agg.counts(AddressFamily::Ipv4).map(|c| c.len()), Some(0));
    }

    #[test]
    fn test_same_prefix_counts_per_path() {
        let mut agg = Aggregator::new();
        agg.add(&path("203.0.113.0/24", vec![64500]));
        agg.add(&path("203.0.113.0/24", vec![64500]));
        assert_eq!(agg.total(AddressFamily::Ipv4), 2);
    }
}
