//! Entries, the lexical items of the dictionary, and the writes the
//! enrichment pipeline applies to them.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{
  analysis::ExternalAnalysis,
  candidate::{CandidateSource, NormalizedRoot},
};

// ─── Lifecycle ───────────────────────────────────────────────────────────────

/// Whether the pipeline has visited an entry.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EnrichmentState {
  /// Not yet enriched; eligible for the next run.
  #[default]
  Pending,
  /// A root was accepted and written.
  Enriched,
  /// Gave up after repeated visits without an acceptable candidate.
  Skipped,
}

// ─── Entry ───────────────────────────────────────────────────────────────────

/// One lexical item as the pipeline sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
  pub id:       i64,
  /// Surface form, possibly vocalised. Never empty.
  pub lemma:    String,
  /// Canonical consonantal root. Once set it is never overwritten.
  pub root:     Option<String>,
  pub pos:      Option<String>,
  /// Cached analyzer output, if the entry was analysed before.
  pub analysis: Option<ExternalAnalysis>,
  pub state:    EnrichmentState,
  /// Visits that ended without an accepted root.
  pub attempts: u32,
}

impl Entry {
  pub fn has_root(&self) -> bool {
    self.root.as_deref().is_some_and(|r| !r.trim().is_empty())
  }
}

/// Fields supplied when seeding the store. `lemma_norm` and the FTS projection
/// are derived by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewEntry {
  pub lemma:      String,
  pub root:       Option<String>,
  pub pattern:    Option<String>,
  pub pos:        Option<String>,
  pub definition: Option<String>,
  pub source:     Option<String>,
}

impl NewEntry {
  pub fn new(lemma: impl Into<String>) -> Self {
    Self { lemma: lemma.into(), ..Self::default() }
  }

  pub fn with_root(mut self, root: impl Into<String>) -> Self {
    self.root = Some(root.into());
    self
  }
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// What the pipeline decided for one entry.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
  /// Fill the missing root and mark the entry `Enriched`.
  Enriched {
    root:   NormalizedRoot,
    source: CandidateSource,
  },
  /// No candidate accepted; count the attempt and keep the entry `Pending`.
  Deferred,
  /// No candidate accepted and the attempt budget is spent.
  Skipped,
}

/// A single row mutation produced while enriching a page.
#[derive(Debug, Clone)]
pub struct EntryWrite {
  pub id:       i64,
  pub outcome:  WriteOutcome,
  /// Freshly computed analysis to cache alongside the outcome.
  pub analysis: Option<ExternalAnalysis>,
}

// ─── Reporting ───────────────────────────────────────────────────────────────

/// Root coverage across the whole table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
  pub total:     u64,
  pub with_root: u64,
  pub pending:   u64,
  pub enriched:  u64,
  pub skipped:   u64,
}

impl Coverage {
  /// Percentage of entries carrying a root, `0.0` for an empty table.
  pub fn root_percent(&self) -> f64 {
    if self.total == 0 {
      0.0
    } else {
      self.with_root as f64 * 100.0 / self.total as f64
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn state_round_trips_through_strings() {
    assert_eq!(EnrichmentState::Pending.as_ref(), "pending");
    assert_eq!(
      "skipped".parse::<EnrichmentState>().unwrap(),
      EnrichmentState::Skipped
    );
    assert!("done".parse::<EnrichmentState>().is_err());
  }

  #[test]
  fn blank_root_counts_as_missing() {
    let mut entry = Entry {
      id:       1,
      lemma:    "كتب".into(),
      root:     Some("  ".into()),
      pos:      None,
      analysis: None,
      state:    EnrichmentState::Pending,
      attempts: 0,
    };
    assert!(!entry.has_root());
    entry.root = Some("ك ت ب".into());
    assert!(entry.has_root());
  }

  #[test]
  fn coverage_percent_handles_empty_table() {
    assert_eq!(Coverage::default().root_percent(), 0.0);
    let c = Coverage { total: 4, with_root: 1, ..Coverage::default() };
    assert_eq!(c.root_percent(), 25.0);
  }
}
