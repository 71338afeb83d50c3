//! Tiered AS name resolution
//!
//! Lookup order: the operator's own ASN, the resolver's memory cache, the
//! shared name cache, then the external registry. Resolution never fails;
//! anything that goes wrong ends in the `Unknown (<asn>)` label.

use crate::database::NameCache;
use anyhow::Result;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Looks up the registered name of an AS
pub trait RegistryLookup {
    fn lookup(&self, asn: u32) -> Result<String>;
}

/// Label returned when an ASN cannot be resolved
pub fn unknown_label(asn: u32) -> String {
    format!("Unknown ({})", asn)
}

/// Key of an ASN in the shared name cache
pub fn cache_key(asn: u32) -> String {
    format!("asn:{}", asn)
}

/// Resolves ASNs to names through memory, shared cache and registry
///
/// The resolver owns its cache handles; two resolvers never share a memory
/// cache.
pub struct AsnResolver {
    own: Option<(u32, String)>,
    memory: HashMap<u32, String>,
    cache: Box<dyn NameCache>,
    registry: Box<dyn RegistryLookup>,
    ttl: Duration,
}

impl AsnResolver {
    pub fn new(cache: Box<dyn NameCache>, registry: Box<dyn RegistryLookup>) -> Self {
        Self {
            own: None,
            memory: HashMap::new(),
            cache,
            registry,
            ttl: crate::database::DEFAULT_ASN_CACHE_TTL,
        }
    }

    /// Answer `asn` with `name` without any lookup
    ///
    /// ASN 0 is reserved and means "not configured".
    pub fn with_own_asn(mut self, asn: u32, name: impl Into<String>) -> Self {
        self.own = (asn != 0).then(|| (asn, name.into()));
        self
    }

    /// Lifetime of names written to the shared cache
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Resolve `asn` to a display name
    pub fn resolve(&mut self, asn: u32) -> String {
        if let Some((own_asn, own_name)) = &self.own {
            if *own_asn == asn {
                return own_name.clone();
            }
        }

        if let Some(name) = self.memory.get(&asn) {
            return name.clone();
        }

        let key = cache_key(asn);
        match self.cache.get(&key) {
            Ok(Some(name)) => {
                debug!("AS{} resolved from shared cache", asn);
                self.memory.insert(asn, name.clone());
                return name;
            }
            Ok(None) => {}
            Err(e) => warn!("Shared name cache read failed for AS{}: {}", asn, e),
        }

        let name = match self.registry.lookup(asn) {
            Ok(name) => name,
            Err(e) => {
                warn!("Failed to resolve AS{}: {}", asn, e);
                // remembered for this run only, never written to the shared cache
                let label = unknown_label(asn);
                self.memory.insert(asn, label.clone());
                return label;
            }
        };

        if let Err(e) = self.cache.set(&key, &name, self.ttl) {
            warn!("Shared name cache write failed for AS{}: {}", asn, e);
        }
        self.memory.insert(asn, name.clone());
        name
    }

    /// Resolve an optional ASN; a missing one resolves to an empty name
    pub fn resolve_opt(&mut self, asn: Option<u32>) -> String {
        asn.map(|a| self.resolve(a)).unwrap_or_default()
    }
}

#[cfg(feature = "registry")]
impl AsnResolver {
    /// Resolver backed by the shared cache file and the registry of `config`
    pub fn from_config(config: &crate::config::RibscopeConfig) -> Result<Self> {
        crate::database::ensure_data_dir(&config.data_dir)?;
        let cache = crate::database::AsnNameCache::open(&config.asn_cache_path())?;
        match cache.purge_expired() {
            Ok(0) => {}
            Ok(n) => debug!("purged {} expired ASN names", n),
            Err(e) => warn!("{}", e),
        }
        let registry = RipeStatRegistry::new(&config.registry_url, config.registry_timeout());
        Ok(Self::new(Box::new(cache), Box::new(registry))
            .with_own_asn(config.own_asn, &config.own_name)
            .with_ttl(config.asn_cache_ttl()))
    }
}

#[cfg(feature = "registry")]
pub use ripestat::RipeStatRegistry;

#[cfg(feature = "registry")]
mod ripestat {
    use super::RegistryLookup;
    use anyhow::{anyhow, Result};
    use serde::Deserialize;
    use std::time::Duration;
    use ureq::Agent;

    #[derive(Debug, Deserialize)]
    struct AsOverviewResponse {
        data: AsOverviewData,
    }

    #[derive(Debug, Deserialize)]
    struct AsOverviewData {
        holder: Option<String>,
    }

    /// Registry lookup against the RIPEstat `as-overview` data call
    pub struct RipeStatRegistry {
        agent: Agent,
        url: String,
    }

    impl RipeStatRegistry {
        pub fn new(url: &str, timeout: Duration) -> Self {
            let agent: Agent = Agent::config_builder()
                .timeout_global(Some(timeout))
                .build()
                .into();
            Self {
                agent,
                url: url.to_string(),
            }
        }
    }

    impl RegistryLookup for RipeStatRegistry {
        fn lookup(&self, asn: u32) -> Result<String> {
            let url = format!("{}?resource=AS{}", self.url, asn);
            let resp = self
                .agent
                .get(&url)
                .call()
                .map_err(|e| anyhow!("Registry request for AS{} failed: {}", asn, e))?
                .body_mut()
                .read_json::<AsOverviewResponse>()
                .map_err(|e| anyhow!("Invalid registry response for AS{}: {}", asn, e))?;

            match resp.data.holder {
                Some(holder) if !holder.trim().is_empty() => Ok(holder),
                _ => Err(anyhow!("No holder registered for AS{}", asn)),
            }
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lens::rib::testing::{FakeCache, FakeRegistry};

    fn resolver(cache: &FakeCache, registry: &FakeRegistry) -> AsnResolver {
        AsnResolver::new(Box::new(cache.clone()), Box::new(registry.clone()))
            .with_own_asn(64500, "Own Network")
    }

    #[test]
    fn test_own_asn_needs_no_lookup() {
        let cache = FakeCache::default();
        let registry = FakeRegistry::with_names(&[(64500, "Registry Name")]);
        let mut r = resolver(&cache, &registry);

        assert_eq!(r.resolve(64500), "Own Network");
        assert_eq!(cache.gets(), 0);
        assert_eq!(cache.sets(), 0);
        assert_eq!(registry.calls(), 0);
    }

    #[test]
    fn test_shared_cache_hit_populates_memory() {
        let cache = FakeCache::default();
        cache.insert("asn:64501", "Cached Network");
        let registry = FakeRegistry::default();
        let mut r = resolver(&cache, &registry);

        assert_eq!(r.resolve(64501), "Cached Network");
        assert_eq!(cache.gets(), 1);

        assert_eq!(r.resolve(64501), "Cached Network");
        // second call served from memory
        assert_eq!(cache.gets(), 1);
        assert_eq!(registry.calls(), 0);
    }

    #[test]
    fn test_registry_result_written_to_both_caches() {
        let cache = FakeCache::default();
        let registry = FakeRegistry::with_names(&[(64502, "Registry Network")]);
        let mut r = resolver(&cache, &registry).with_ttl(Duration::from_secs(60));

        assert_eq!(r.resolve(64502), "Registry Network");
        assert_eq!(registry.calls(), 1);
        assert_eq!(cache.value("asn:64502").as_deref(), Some("Registry Network"));
        assert_eq!(cache.last_ttl(), Some(Duration::from_secs(60)));

        assert_eq!(r.resolve(64502), "Registry Network");
        assert_eq!(registry.calls(), 1);
    }

    #[test]
    fn test_registry_failure_falls_back() {
        let cache = FakeCache::default();
        let registry = FakeRegistry::default();
        let mut r = resolver(&cache, &registry);

        assert_eq!(r.resolve(64503), "Unknown (64503)");
        assert_eq!(r.resolve(64503), "Unknown (64503)");
        assert_eq!(registry.calls(), 1);
        assert_eq!(cache.sets(), 0);
    }

    #[test]
    fn test_cache_failures_degrade_to_registry() {
        let cache = FakeCache::failing();
        let registry = FakeRegistry::with_names(&[(64504, "Registry Network")]);
        let mut r = resolver(&cache, &registry);

        assert_eq!(r.resolve(64504), "Registry Network");
        assert_eq!(registry.calls(), 1);
    }

    #[test]
    fn test_own_asn_zero_is_unset() {
        let cache = FakeCache::default();
        let registry = FakeRegistry::default();
        let mut r = AsnResolver::new(Box::new(cache.clone()), Box::new(registry.clone()))
            .with_own_asn(0, "Nobody");

        assert_eq!(r.resolve(0), "Unknown (0)");
        assert_eq!(r.resolve_opt(None), "");
    }
}
