//! Routing table snapshot pipeline
//!
//! Turns the paths listed by a BGP speaker into canonical records, tallies
//! origin ASNs per address family and merges the records into the document
//! store.
//!
//! # Usage
//!
//! ```rust,ignore
//! use ribscope::database::RibscopeDatabase;
//! use ribscope::lens::rib::{AsnResolver, FamilySelection, PathLoader};
//! use ribscope::speaker::GobgpClient;
//! use ribscope::RibscopeConfig;
//!
//! let config = RibscopeConfig::new(&None)?;
//! let speaker = GobgpClient::new(&config.speaker_endpoint, config.speaker_timeout())?;
//! let db = RibscopeDatabase::open(&config.sqlite_path())?;
//! let docs = db.documents();
//! let mut resolver = AsnResolver::from_config(&config)?;
//!
//! let report = PathLoader::from_config(&config, &speaker)
//!     .with_store(&docs)
//!     .load(&FamilySelection::Both.families(), &mut resolver)?;
//! println!("{} prefixes", report.summary.total_prefixes);
//! ```

mod aggregate;
mod attribute;
mod filter;
mod loader;
mod normalize;
mod path;
mod persist;
mod resolve;
mod summary;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregate::Aggregator;
pub use attribute::{
    AttributeDecoder, AttributeKind, FieldDecodeError, MatchMode, PathAttribute,
};
pub use filter::BlacklistFilter;
pub use loader::{
    FamilyReport, FamilySelection, LoadProgress, LoadProgressCallback, LoadReport, PathLoader,
};
pub use normalize::{PathDiscardError, PathNormalizer};
pub use path::{AddressFamily, CanonicalPath, IxpSubnet, IxpTable, IXP_NOT_APPLICABLE};
pub use persist::{PersistFailure, PersistReport, Persister};
pub use resolve::{cache_key, unknown_label, AsnResolver, RegistryLookup};
pub use summary::{FamilySummary, SummaryReport, SummaryReporter, SummaryRow};

#[cfg(feature = "registry")]
pub use resolve::RipeStatRegistry;
