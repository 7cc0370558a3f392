//! One page of work: the decisions made for each entry and the writes that
//! carry them. Built in memory, committed, folded into the run statistics and
//! dropped.

use std::collections::HashSet;

use qamus_core::{
  candidate::{CandidateSource, NormalizedRoot, RootCandidate},
  entry::{EntryWrite, WriteOutcome},
};

use crate::validator::Rejection;

#[derive(Debug, Clone, PartialEq)]
pub struct Accepted {
  pub id:     i64,
  pub root:   NormalizedRoot,
  pub source: CandidateSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rejected {
  pub id:        i64,
  pub candidate: RootCandidate,
  pub reason:    Rejection,
}

/// Why an entry ended the page without a root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unresolved {
  NoCandidate,
  LowConfidence,
  Malformed,
}

#[derive(Debug, Default)]
pub struct EnrichmentBatch {
  /// Cursor the page was read after.
  pub offset:         i64,
  pub size:           usize,
  pub candidates:     Vec<RootCandidate>,
  pub accepted:       Vec<Accepted>,
  /// Every rejected candidate, including those of entries that were
  /// eventually enriched by a lower-ranked one.
  pub rejected:       Vec<Rejected>,
  pub unresolved:     Vec<(i64, Unresolved)>,
  /// Entries whose write could not be committed.
  pub errors:         Vec<i64>,
  pub analyzer_calls: u64,
  pub writes:         Vec<EntryWrite>,
}

impl EnrichmentBatch {
  pub fn new(offset: i64, size: usize) -> Self {
    Self {
      offset,
      size,
      writes: Vec::with_capacity(size),
      ..Self::default()
    }
  }

  pub fn accept(&mut self, write: EntryWrite) {
    if let WriteOutcome::Enriched { root, source } = &write.outcome {
      self.accepted.push(Accepted {
        id:     write.id,
        root:   root.clone(),
        source: *source,
      });
    }
    self.writes.push(write);
  }

  pub fn leave_unresolved(&mut self, write: EntryWrite, why: Unresolved) {
    self.unresolved.push((write.id, why));
    self.writes.push(write);
  }

  pub fn failed_ids(&self) -> HashSet<i64> { self.errors.iter().copied().collect() }

  /// Entries moved to `Skipped` by this page.
  pub fn skipped(&self) -> impl Iterator<Item = i64> + '_ {
    self
      .writes
      .iter()
      .filter(|w| matches!(w.outcome, WriteOutcome::Skipped))
      .map(|w| w.id)
  }
}
