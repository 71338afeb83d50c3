//! Administrative prefix exclusion

use super::path::CanonicalPath;
use ipnet::IpNet;
use tracing::debug;

/// Drops paths whose prefix lies inside a blacklisted network
#[derive(Debug, Clone, Default)]
pub struct BlacklistFilter {
    networks: Vec<IpNet>,
}

impl BlacklistFilter {
    pub fn new(networks: Vec<IpNet>) -> Self {
        Self { networks }
    }

    /// The blacklisted network covering `prefix`, if any
    pub fn covering(&self, prefix: &IpNet) -> Option<&IpNet> {
        self.networks.iter().find(|net| net.contains(prefix))
    }

    /// Whether the path may be stored and counted
    pub fn accepts(&self, path: &CanonicalPath) -> bool {
        match self.covering(&path.prefix) {
            Some(net) => {
                debug!("{} dropped by blacklist entry {}", path.prefix, net);
                false
            }
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn path(prefix: &str) -> CanonicalPath {
        CanonicalPath {
            prefix: prefix.parse().unwrap(),
            next_hops: vec![],
            asn_path: vec![64501],
            communities: vec![],
            neighbor: "192.0.2.1".to_string(),
            source_id: String::new(),
            age: Utc::now(),
        }
    }

    #[test]
    fn test_exact_match_rejected() {
        let filter = BlacklistFilter::new(vec!["203.0.113.0/24".parse().unwrap()]);
        assert!(!filter.accepts(&path("203.0.113.0/24")));
    }

    #[test]
    fn test_more_specific_rejected() {
        let filter = BlacklistFilter::new(vec!["10.0.0.0/8".parse().unwrap()]);
        assert!(!filter.accepts(&path("10.20.0.0/16")));
        // the covering network of a blacklisted one is not excluded
        assert!(filter.accepts(&path("0.0.0.0/0")));
        assert!(filter.accepts(&path("11.0.0.0/8")));
    }

    #[test]
    fn test_families_do_not_mix() {
        let filter = BlacklistFilter::new(vec!["::/0".parse().unwrap()]);
        assert!(!filter.accepts(&path("2001:db8::/32")));
        assert!(filter.accepts(&path("203.0.113.0/24")));
    }

    #[test]
    fn test_empty_blacklist_accepts_all() {
        let filter = BlacklistFilter::default();
        assert!(filter.accepts(&path("203.0.113.0/24")));
        assert!(filter.covering(&"::/0".parse().unwrap()).is_none());
    }
}
