//! Run configuration.
//!
//! Values come from an optional TOML file, then `QAMUS_*` environment
//! variables, then command-line flags. Everything is passed to the pipeline
//! at construction time.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use qamus_core::candidate::CandidateSource;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Retry ───────────────────────────────────────────────────────────────────

/// How often a busy store operation is tried, and how long to wait between
/// tries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
  /// Total tries, including the first.
  pub attempts:      u32,
  pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
  fn default() -> Self { Self { attempts: 3, base_delay_ms: 200 } }
}

impl RetryPolicy {
  /// Delay after the `attempt`-th failed try (1-based); grows linearly.
  pub fn delay(&self, attempt: u32) -> Duration {
    Duration::from_millis(self.base_delay_ms.saturating_mul(u64::from(attempt)))
  }
}

// ─── Pipeline options ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichOptions {
  /// Entries per page; each page is one transaction.
  pub batch_size:      usize,
  /// Stop after this many entries have been visited.
  pub max_entries:     Option<usize>,
  /// Visits without an accepted root before an entry becomes `Skipped`.
  pub max_attempts:    u32,
  /// Candidate strategies, most trusted first.
  pub strategies:      Vec<CandidateSource>,
  /// Call the analyzer for entries that have no cached analysis.
  pub analyze_missing: bool,
  /// Rebuild the whole search index once the pages are written.
  pub rebuild_index:   bool,
  /// Return `Skipped` entries to `Pending` before the run.
  pub reset_skipped:   bool,
  pub retry:           RetryPolicy,
  pub busy_timeout_ms: u64,
}

impl Default for EnrichOptions {
  fn default() -> Self {
    Self {
      batch_size:      100,
      max_entries:     None,
      max_attempts:    3,
      strategies:      vec![CandidateSource::ExternalAnalyzer, CandidateSource::PatternHeuristic],
      analyze_missing: true,
      rebuild_index:   false,
      reset_skipped:   false,
      retry:           RetryPolicy::default(),
      busy_timeout_ms: 5000,
    }
  }
}

impl EnrichOptions {
  pub fn validate(&self) -> Result<()> {
    if self.batch_size == 0 {
      return Err(Error::InvalidOption("batch_size must be at least 1".into()));
    }
    if self.max_attempts == 0 {
      return Err(Error::InvalidOption("max_attempts must be at least 1".into()));
    }
    if self.strategies.is_empty() {
      return Err(Error::InvalidOption("at least one strategy is required".into()));
    }
    if self.retry.attempts == 0 {
      return Err(Error::InvalidOption("retry.attempts must be at least 1".into()));
    }
    Ok(())
  }

  pub fn busy_timeout(&self) -> Duration { Duration::from_millis(self.busy_timeout_ms) }
}

// ─── Settings ────────────────────────────────────────────────────────────────

/// Everything the `qamus-enrich` binary reads from file and environment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
  /// Path of the SQLite store.
  #[serde(default)]
  pub db:       Option<PathBuf>,
  /// JSON analyzer table; without one the analyzer is unavailable.
  #[serde(default)]
  pub analyses: Option<PathBuf>,
  #[serde(flatten)]
  pub enrich:   EnrichOptions,
}

impl Settings {
  /// Read `file` if it exists, then overlay `QAMUS_*` variables. Nested keys
  /// use a double underscore, e.g. `QAMUS_RETRY__ATTEMPTS`.
  pub fn load(file: &Path) -> Result<Self> { Self::load_with(file, Self::environment()) }

  fn environment() -> config::Environment {
    config::Environment::with_prefix("QAMUS")
      .prefix_separator("_")
      .separator("__")
      .try_parsing(true)
      .list_separator(",")
      .with_list_parse_key("strategies")
  }

  fn load_with(file: &Path, environment: config::Environment) -> Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(file).required(false))
      .add_source(environment)
      .build()?;
    Ok(settings.try_deserialize()?)
  }
}
