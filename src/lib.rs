//! Bigaray ingest - fashion catalog ingestion
//!
//! Site adapters scrape product listings, which are normalized and
//! reconciled into a SQLite catalog. Separate sweeps retire dead product
//! links and drop products whose image files are gone.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
