//! Lens module
//!
//! Lenses hold the business logic of ribscope, independent of how it is
//! invoked. The CLI in `src/bin` is a thin layer over them.
//!
//! - `rib`: the routing table snapshot pipeline
//! - `utils`: output formats and name truncation shared by reports

pub mod rib;
pub mod utils;
