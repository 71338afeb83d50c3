#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Ribscope - routing table snapshots of a local BGP speaker
//!
//! Ribscope pulls the unicast routing tables of a BGP speaker over its gRPC
//! API, normalizes every path into a canonical record, tallies origin ASNs
//! per address family and merges the records into a SQLite document store.
//! It can be used both as a command-line application and as a library.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | `registry` | ASN name lookups against RIPEstat | `ureq` |
//! | `display` | Table formatting of reports | `tabled` |
//! | `cli` | The `ribscope` binary | All above + `clap`, `indicatif` |
//!
//! ```toml
//! # Pipeline only, bring your own name registry
//! ribscope = { version = "0.1", default-features = false }
//!
//! # Default (CLI binary)
//! ribscope = "0.1"
//! ```
//!
//! # Architecture
//!
//! - **[`speaker`]**: the BGP speaker seam (`BgpSpeaker`) and the GoBGP gRPC client
//! - **[`lens`]**: the snapshot pipeline (`lens::rib`) and output helpers
//! - **[`database`]**: the path document store and the shared ASN name cache
//! - **[`config`]**: configuration management
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use ribscope::lens::rib::{AsnResolver, FamilySelection, PathLoader};
//! use ribscope::speaker::GobgpClient;
//! use ribscope::{RibscopeConfig, RibscopeDatabase};
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
//!
//! for family in &report.summary.families {
//!     println!("{}: {} prefixes", family.family, family.total);
//! }
//! ```

pub mod config;
pub mod database;
pub mod lens;
pub mod speaker;

pub use config::RibscopeConfig;

pub use database::{
    AsnNameCache, DatabaseConn, DocumentStore, NameCache, PathDocument, RibscopeDatabase,
};

pub use lens::rib::{
    AddressFamily, AsnResolver, CanonicalPath, LoadReport, PathLoader, SummaryReporter,
};
pub use lens::utils::OutputFormat;

pub use speaker::{BgpSpeaker, GobgpClient, RawPath};
