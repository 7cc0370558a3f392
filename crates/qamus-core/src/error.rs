//! Error types for `qamus-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown enrichment state: {0:?}")]
  UnknownEnrichmentState(String),

  #[error("unknown candidate source: {0:?}")]
  UnknownCandidateSource(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
