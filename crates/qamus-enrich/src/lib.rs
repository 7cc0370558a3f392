//! The lexicon enrichment pipeline.
//!
//! [`Orchestrator`] pages through entries that lack a root. For each one the
//! [`CandidateGenerator`] proposes roots from the cached analyzer output and
//! an affix-stripping heuristic, and the [`validator`] accepts the best one
//! that the [`RootCorpus`] supports. Each page is written in one transaction
//! while the [`IndexManager`] holds the search index detached.

pub mod analyzer;
pub mod batch;
pub mod config;
pub mod error;
pub mod generator;
pub mod index;
pub mod orchestrator;
pub mod retry;
pub mod stats;
pub mod validator;

use std::path::Path;

use qamus_store_sqlite::SqliteStore;

pub use analyzer::TableAnalyzer;
pub use batch::EnrichmentBatch;
pub use config::{EnrichOptions, RetryPolicy, Settings};
pub use error::{Error, Result};
pub use generator::CandidateGenerator;
pub use index::IndexManager;
pub use orchestrator::{Orchestrator, StopHandle};
pub use stats::EnrichmentStats;
pub use validator::RootCorpus;

/// Open an existing SQLite store for enrichment.
pub async fn open_store(path: &Path, options: &EnrichOptions) -> Result<SqliteStore> {
  let open_error = |source: qamus_store_sqlite::Error| Error::StoreOpen {
    path:   path.to_path_buf(),
    source: Box::new(source),
  };

  let store = SqliteStore::open(path).await.map_err(open_error)?;
  store
    .set_busy_timeout(options.busy_timeout())
    .await
    .map_err(open_error)?;
  Ok(store)
}

#[cfg(test)]
mod tests;
