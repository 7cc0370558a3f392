//! Error type for `qamus-enrich`.
//!
//! Only the variants here ever abort a run. Busy stores, rejected candidates
//! and failed rows are counted in [`EnrichmentStats`](crate::EnrichmentStats)
//! instead.

use std::path::PathBuf;

use thiserror::Error;

use crate::EnrichmentStats;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  /// The store could not be opened at startup.
  #[error("failed to open store {}: {source}", path.display())]
  StoreOpen {
    path:   PathBuf,
    #[source]
    source: BoxError,
  },

  /// The search index triggers could not be re-attached.
  #[error("search index left detached: {source}")]
  IndexStateCorruption {
    source: BoxError,
    /// Counts for the pages committed before the run stopped.
    stats:  Option<Box<EnrichmentStats>>,
  },

  #[error("store error: {0}")]
  Store(#[source] BoxError),

  #[error("analysis table {}: {source}", path.display())]
  AnalysisTable {
    path:   PathBuf,
    #[source]
    source: BoxError,
  },

  #[error("configuration error: {0}")]
  Config(#[from] config::ConfigError),

  #[error("invalid option: {0}")]
  InvalidOption(String),
}

impl Error {
  pub(crate) fn store(err: impl std::error::Error + Send + Sync + 'static) -> Self {
    Error::Store(Box::new(err))
  }

  pub(crate) fn index(err: impl std::error::Error + Send + Sync + 'static) -> Self {
    Error::IndexStateCorruption { source: Box::new(err), stats: None }
  }

  /// Attach what the run had done before failing.
  pub(crate) fn with_stats(self, partial: EnrichmentStats) -> Self {
    match self {
      Error::IndexStateCorruption { source, .. } => Error::IndexStateCorruption {
        source,
        stats: Some(Box::new(partial)),
      },
      other => other,
    }
  }

  /// Statistics of a run that stopped part-way, if any were kept.
  pub fn partial_stats(&self) -> Option<&EnrichmentStats> {
    match self {
      Error::IndexStateCorruption { stats, .. } => stats.as_deref(),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
