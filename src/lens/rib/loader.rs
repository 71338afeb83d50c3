//! Snapshot loading pipeline
//!
//! For each selected family, strictly in order:
//!
//! ```text
//! fetch ──> normalize ──> blacklist ──> aggregate ──> persist
//! ```
//!
//! and finally one summary across all families. A failed fetch aborts the
//! whole run; anything after the fetch degrades per record.

use super::aggregate::Aggregator;
use super::filter::BlacklistFilter;
use super::normalize::PathNormalizer;
use super::path::{AddressFamily, CanonicalPath, IxpTable};
use super::persist::{PersistReport, Persister};
use super::resolve::AsnResolver;
use super::summary::{SummaryReport, SummaryReporter};
use crate::config::RibscopeConfig;
use crate::database::DocumentStore;
use crate::speaker::BgpSpeaker;
use anyhow::{anyhow, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// Which address families to load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum FamilySelection {
    Ipv4,
    Ipv6,
    /// IPv4, then IPv6
    #[default]
    Both,
}

impl FamilySelection {
    pub fn families(&self) -> Vec<AddressFamily> {
        match self {
            FamilySelection::Ipv4 => vec![AddressFamily::Ipv4],
            FamilySelection::Ipv6 => vec![AddressFamily::Ipv6],
            FamilySelection::Both => AddressFamily::ALL.to_vec(),
        }
    }
}

/// Progress of a load run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadProgress {
    /// Listing a family's paths from the speaker
    FetchStarted { family: AddressFamily },
    /// The speaker returned `paths` raw paths
    Fetched { family: AddressFamily, paths: usize },
    /// `done` of `total` accepted paths written
    Persisted {
        family: AddressFamily,
        done: usize,
        total: usize,
    },
    /// All stages of a family are done
    FamilyCompleted {
        family: AddressFamily,
        accepted: usize,
    },
}

/// Type alias for progress callback function
pub type LoadProgressCallback = Arc<dyn Fn(LoadProgress) + Send + Sync>;

/// What happened to one family's paths
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FamilyReport {
    pub family: Option<AddressFamily>,
    /// Raw paths listed by the speaker
    pub fetched: usize,
    /// Paths that could not be normalized
    pub discarded: usize,
    /// Paths inside a blacklisted network
    pub blacklisted: usize,
    /// Paths passed on to aggregation and persistence
    pub accepted: usize,
    /// Accepted paths without an origin ASN
    pub uncounted: usize,
    /// Present when a document store was attached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persist: Option<PersistReport>,
}

/// Result of a load run
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub families: Vec<FamilyReport>,
    pub summary: SummaryReport,
    #[serde(skip)]
    pub aggregator: Aggregator,
}

/// Pulls routing table snapshots from a speaker through the pipeline
pub struct PathLoader<'a> {
    speaker: &'a dyn BgpSpeaker,
    normalizer: PathNormalizer,
    filter: BlacklistFilter,
    ixps: IxpTable,
    store: Option<&'a dyn DocumentStore>,
    retries: u32,
    reporter: SummaryReporter,
}

impl<'a> PathLoader<'a> {
    pub fn new(
        speaker: &'a dyn BgpSpeaker,
        normalizer: PathNormalizer,
        filter: BlacklistFilter,
        ixps: IxpTable,
    ) -> Self {
        Self {
            speaker,
            normalizer,
            filter,
            ixps,
            store: None,
            retries: 1,
            reporter: SummaryReporter::default(),
        }
    }

    /// Loader wired with the local identity, blacklist and IX table of `config`
    pub fn from_config(config: &RibscopeConfig, speaker: &'a dyn BgpSpeaker) -> Self {
        Self::new(
            speaker,
            PathNormalizer::new(config.own_asn, config.local_aggregates.clone()),
            BlacklistFilter::new(config.blacklist.clone()),
            config.ixps.clone(),
        )
        .with_retries(config.persist_retries)
    }

    /// Persist accepted paths into `store`
    pub fn with_store(mut self, store: &'a dyn DocumentStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_reporter(mut self, reporter: SummaryReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn load(
        &self,
        families: &[AddressFamily],
        resolver: &mut AsnResolver,
    ) -> Result<LoadReport> {
        self.load_with_progress(families, resolver, None)
    }

    /// Run the pipeline for `families` in the given order
    pub fn load_with_progress(
        &self,
        families: &[AddressFamily],
        resolver: &mut AsnResolver,
        callback: Option<LoadProgressCallback>,
    ) -> Result<LoadReport> {
        let emit = |progress: LoadProgress| {
            if let Some(cb) = &callback {
                cb(progress);
            }
        };

        let mut aggregator = Aggregator::new();
        let mut reports = Vec::new();

        for &family in families {
            emit(LoadProgress::FetchStarted { family });
            info!("Listing {} paths from speaker", family);
            let raw_paths = self
                .speaker
                .list_path(family)
                .map_err(|e| anyhow!("Failed to list {} paths: {}", family, e))?;
            let fetched_at = Utc::now();
            emit(LoadProgress::Fetched {
                family,
                paths: raw_paths.len(),
            });

            let mut report = FamilyReport {
                family: Some(family),
                fetched: raw_paths.len(),
                ..Default::default()
            };

            let mut accepted: Vec<CanonicalPath> = Vec::with_capacity(raw_paths.len());
            for raw in &raw_paths {
                let path = match self.normalizer.normalize(raw, fetched_at) {
                    Ok(path) => path,
                    Err(e) => {
                        error!("Discarding path from {}: {}", raw.neighbor_ip, e);
                        report.discarded += 1;
                        continue;
                    }
                };
                if !self.filter.accepts(&path) {
                    report.blacklisted += 1;
                    continue;
                }
                accepted.push(path);
            }
            report.accepted = accepted.len();
            info!(
                "{}: {} fetched, {} discarded, {} blacklisted, {} accepted",
                family, report.fetched, report.discarded, report.blacklisted, report.accepted
            );

            // tallies are final before anything is written
            aggregator.touch(family);
            for path in &accepted {
                if !aggregator.add(path) {
                    report.uncounted += 1;
                }
            }

            if let Some(store) = self.store {
                let persister = Persister::new(store, &self.ixps).with_retries(self.retries);
                let persisted =
                    persister.persist_with_progress(&accepted, resolver, |done, total| {
                        emit(LoadProgress::Persisted {
                            family,
                            done,
                            total,
                        })
                    });
                report.persist = Some(persisted);
            }

            emit(LoadProgress::FamilyCompleted {
                family,
                accepted: report.accepted,
            });
            reports.push(report);
        }

        let summary = self.reporter.build(&aggregator, resolver);
        Ok(LoadReport {
            families: reports,
            summary,
            aggregator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lens::rib::testing::{raw_path, FakeCache, FakeRegistry, FakeSpeaker, FakeStore};
    use crate::speaker::RawPath;
    use std::sync::Mutex;

    fn resolver() -> AsnResolver {
        let registry = FakeRegistry::with_names(&[(64501, "Peer Network")]);
        AsnResolver::new(Box::new(FakeCache::default()), Box::new(registry))
            .with_own_asn(64500, "Own Network")
    }

    fn loader<'a>(speaker: &'a FakeSpeaker, blacklist: Vec<&str>) -> PathLoader<'a> {
        PathLoader::new(
            speaker,
            PathNormalizer::new(64500, vec!["192.0.2.0/24".parse().unwrap()]),
            BlacklistFilter::new(blacklist.iter().map(|n| n.parse().unwrap()).collect()),
            IxpTable::default(),
        )
    }

    fn ipv4_table() -> Vec<RawPath> {
        vec![
            raw_path("203.0.113.0/24", "198.51.100.1", &[64501, 64502], "198.51.100.1"),
            raw_path("203.0.114.0/24", "198.51.100.1", &[64501], "198.51.100.1"),
            raw_path("198.18.0.0/15", "198.51.100.1", &[64503], "198.51.100.1"),
            // no AS path, inside the local aggregate
            raw_path("192.0.2.128/25", "198.51.100.1", &[], "198.51.100.1"),
            // no AS path, outside any aggregate
            raw_path("100.64.0.0/10", "198.51.100.1", &[], "198.51.100.1"),
            RawPath {
                nlri: None,
                neighbor_ip: "198.51.100.1".to_string(),
                ..Default::default()
            },
        ]
    }

    fn ipv6_table() -> Vec<RawPath> {
        vec![raw_path(
            "2001:db8:100::/48",
            "2001:db8::1",
            &[64501],
            "2001:db8::1",
        )]
    }

    #[test]
    fn test_counts_sum_to_accepted_with_origin() {
        let speaker = FakeSpeaker::new(ipv4_table(), ipv6_table());
        let report = loader(&speaker, vec!["198.18.0.0/15"])
            .load(&AddressFamily::ALL, &mut resolver())
            .unwrap();

        let v4 = &report.families[0];
        assert_eq!(v4.fetched, 6);
        assert_eq!(v4.discarded, 1);
        assert_eq!(v4.blacklisted, 1);
        assert_eq!(v4.accepted, 4);
        assert_eq!(v4.uncounted, 1);

        let counts = report.aggregator.counts(AddressFamily::Ipv4).unwrap();
        assert_eq!(counts.get("64501"), Some(&2));
        assert_eq!(counts.get("64500"), Some(&1));
        assert_eq!(counts.get("64503"), None);
        assert_eq!(
            report.aggregator.total(AddressFamily::Ipv4),
            (v4.accepted - v4.uncounted) as u64
        );

        assert_eq!(report.aggregator.total(AddressFamily::Ipv6), 1);
        assert_eq!(report.summary.total_prefixes, 4);
        assert_eq!(speaker.calls(), AddressFamily::ALL.to_vec());
    }

    #[test]
    fn test_blacklisted_paths_are_not_persisted() {
        let speaker = FakeSpeaker::new(
            vec![
                raw_path("203.0.113.0/24", "192.0.2.1", &[64500, 64501], "192.0.2.1"),
                raw_path("198.51.100.0/24", "192.0.2.1", &[64501], "192.0.2.1"),
            ],
            vec![],
        );
        let store = FakeStore::default();
        let report = loader(&speaker, vec!["203.0.113.0/24"])
            .with_store(&store)
            .load(&[AddressFamily::Ipv4], &mut resolver())
            .unwrap();

        assert_eq!(store.len(), 1);
        assert!(store.docs().iter().all(|d| d.prefix() != "203.0.113.0/24"));
        assert_eq!(report.aggregator.counts(AddressFamily::Ipv4).unwrap().get("64500"), None);
        assert_eq!(report.families[0].persist.as_ref().unwrap().created, 1);
    }

    #[test]
    fn test_reload_only_updates() {
        let speaker = FakeSpeaker::new(ipv4_table(), ipv6_table());
        let store = FakeStore::default();
        let loader = loader(&speaker, vec![]).with_store(&store);
        let mut resolver = resolver();

        loader.load(&AddressFamily::ALL, &mut resolver).unwrap();
        let stored = store.len();
        let report = loader.load(&AddressFamily::ALL, &mut resolver).unwrap();

        assert_eq!(store.len(), stored);
        assert_eq!(store.creates(), stored);
        let v4 = report.families[0].persist.as_ref().unwrap();
        assert_eq!(v4.created, 0);
        assert_eq!(v4.updated, 5);
    }

    #[test]
    fn test_fetch_failure_aborts() {
        let speaker = FakeSpeaker::unreachable();
        let store = FakeStore::default();
        let err = loader(&speaker, vec![])
            .with_store(&store)
            .load(&AddressFamily::ALL, &mut resolver())
            .unwrap_err();

        assert!(err.to_string().contains("Failed to list ipv4 paths"));
        assert_eq!(speaker.calls(), vec![AddressFamily::Ipv4]);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_family_selection() {
        let speaker = FakeSpeaker::new(ipv4_table(), ipv6_table());
        let report = loader(&speaker, vec![])
            .load(&FamilySelection::Ipv6.families(), &mut resolver())
            .unwrap();

        assert_eq!(speaker.calls(), vec![AddressFamily::Ipv6]);
        assert_eq!(report.families.len(), 1);
        assert_eq!(report.summary.families[0].family, AddressFamily::Ipv6);
        assert_eq!(FamilySelection::default().families(), AddressFamily::ALL.to_vec());
    }

    #[test]
    fn test_progress_events() {
        let speaker = FakeSpeaker::new(ipv4_table(), vec![]);
        let store = FakeStore::default();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let callback: LoadProgressCallback = Arc::new(move |p| sink.lock().unwrap().push(p));

        loader(&speaker, vec![])
            .with_store(&store)
            .load_with_progress(&[AddressFamily::Ipv4], &mut resolver(), Some(callback))
            .unwrap();

        let events = events.lock().unwrap();
        assert_eq!(
            events.first(),
            Some(&LoadProgress::FetchStarted {
                family: AddressFamily::Ipv4
            })
        );
        assert!(events.contains(&LoadProgress::Fetched {
            family: AddressFamily::Ipv4,
            paths: 6
        }));
        assert!(events.contains(&LoadProgress::Persisted {
            family: AddressFamily::Ipv4,
            done: 5,
            total: 5
        }));
        assert_eq!(
            events.last(),
            Some(&LoadProgress::FamilyCompleted {
                family: AddressFamily::Ipv4,
                accepted: 5
            })
        );
    }
}
