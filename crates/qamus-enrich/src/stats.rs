//! Aggregate statistics for one run, printed as the end-of-run summary.

use std::fmt;

use chrono::{DateTime, Utc};
use qamus_core::{
  candidate::CandidateSource,
  entry::Coverage,
  store::IndexCounts,
};
use serde::Serialize;
use uuid::Uuid;

use crate::batch::{EnrichmentBatch, Unresolved};

#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentStats {
  pub run_id:                  Uuid,
  pub started_at:              DateTime<Utc>,
  pub finished_at:             Option<DateTime<Utc>>,
  pub pages:                   u64,
  /// Entries visited.
  pub processed:               u64,
  /// Entries given a root and committed.
  pub accepted:                u64,
  pub accepted_external:       u64,
  pub accepted_pattern:        u64,
  /// Entries whose candidates all failed corroboration or length checks.
  pub rejected_low_confidence: u64,
  /// Entries with at least one unparsable candidate and no accepted one.
  pub malformed:               u64,
  pub no_candidate:            u64,
  /// Root hypotheses generated, across all strategies.
  pub candidates:              u64,
  /// Hypotheses turned down by the validator, by strategy.
  pub rejected_external:       u64,
  pub rejected_pattern:        u64,
  /// Entries moved to `Skipped` in this run.
  pub skipped:                 u64,
  /// Entries whose write could not be committed; still `Pending`.
  pub errors:                  u64,
  pub analyzer_calls:          u64,
  pub page_retries:            u64,
  /// Pages committed row by row after the page commit failed.
  pub row_fallbacks:           u64,
  pub stopped_early:           bool,
  /// Why the run ended before running out of pending entries.
  pub halted:                  Option<String>,
  pub index_rebuilt:           bool,
  pub index:                   Option<IndexCounts>,
  pub coverage_before:         Option<Coverage>,
  pub coverage_after:          Option<Coverage>,
}

impl EnrichmentStats {
  pub fn new(run_id: Uuid) -> Self {
    Self {
      run_id,
      started_at: Utc::now(),
      finished_at: None,
      pages: 0,
      processed: 0,
      accepted: 0,
      accepted_external: 0,
      accepted_pattern: 0,
      rejected_low_confidence: 0,
      malformed: 0,
      no_candidate: 0,
      candidates: 0,
      rejected_external: 0,
      rejected_pattern: 0,
      skipped: 0,
      errors: 0,
      analyzer_calls: 0,
      page_retries: 0,
      row_fallbacks: 0,
      stopped_early: false,
      halted: None,
      index_rebuilt: false,
      index: None,
      coverage_before: None,
      coverage_after: None,
    }
  }

  /// Fold a committed page in. Entries whose write failed count only as
  /// errors.
  pub fn absorb(&mut self, batch: &EnrichmentBatch) {
    let failed = batch.failed_ids();

    self.pages += 1;
    self.processed += batch.size as u64;
    self.analyzer_calls += batch.analyzer_calls;
    self.errors += failed.len() as u64;
    self.candidates += batch.candidates.len() as u64;

    for rejected in &batch.rejected {
      match rejected.candidate.source {
        CandidateSource::ExternalAnalyzer => self.rejected_external += 1,
        CandidateSource::PatternHeuristic => self.rejected_pattern += 1,
      }
    }

    for accepted in batch.accepted.iter().filter(|a| !failed.contains(&a.id)) {
      self.accepted += 1;
      match accepted.source {
        CandidateSource::ExternalAnalyzer => self.accepted_external += 1,
        CandidateSource::PatternHeuristic => self.accepted_pattern += 1,
      }
    }

    for (_, why) in batch.unresolved.iter().filter(|(id, _)| !failed.contains(id)) {
      match why {
        Unresolved::NoCandidate => self.no_candidate += 1,
        Unresolved::LowConfidence => self.rejected_low_confidence += 1,
        Unresolved::Malformed => self.malformed += 1,
      }
    }

    self.skipped += batch.skipped().filter(|id| !failed.contains(id)).count() as u64;
  }

  /// Share of visited entries that were given a root.
  pub fn acceptance_rate(&self) -> f64 {
    if self.processed == 0 {
      0.0
    } else {
      self.accepted as f64 / self.processed as f64
    }
  }

  pub fn finish(&mut self) { self.finished_at = Some(Utc::now()); }
}

impl fmt::Display for EnrichmentStats {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "Enrichment run {}", self.run_id)?;
    if let Some(finished) = self.finished_at {
      let secs = (finished - self.started_at).num_milliseconds() as f64 / 1000.0;
      writeln!(f, "  duration:          {secs:.1}s")?;
    }
    writeln!(f, "  pages:             {}", self.pages)?;
    writeln!(f, "  processed:         {}", self.processed)?;
    writeln!(
      f,
      "  accepted:          {} ({:.1}%; external {}, pattern {})",
      self.accepted,
      self.acceptance_rate() * 100.0,
      self.accepted_external,
      self.accepted_pattern
    )?;
    writeln!(f, "  rejected:          {}", self.rejected_low_confidence)?;
    writeln!(f, "  malformed:         {}", self.malformed)?;
    writeln!(f, "  no candidate:      {}", self.no_candidate)?;
    writeln!(
      f,
      "  candidates:        {} (turned down: external {}, pattern {})",
      self.candidates, self.rejected_external, self.rejected_pattern
    )?;
    writeln!(f, "  skipped:           {}", self.skipped)?;
    writeln!(f, "  errors:            {}", self.errors)?;
    writeln!(f, "  analyzer calls:    {}", self.analyzer_calls)?;
    writeln!(
      f,
      "  retries:           {} page, {} row fallback",
      self.page_retries, self.row_fallbacks
    )?;
    if let (Some(before), Some(after)) = (self.coverage_before, self.coverage_after) {
      writeln!(
        f,
        "  root coverage:     {:.1}% -> {:.1}% of {} entries",
        before.root_percent(),
        after.root_percent(),
        after.total
      )?;
    }
    if let Some(index) = self.index {
      let note = if self.index_rebuilt { "rebuilt" } else { "not rebuilt" };
      writeln!(
        f,
        "  search index:      {} of {} rows ({note})",
        index.indexed, index.entries
      )?;
    }
    if self.stopped_early {
      writeln!(f, "  stopped early on request")?;
    }
    if let Some(reason) = &self.halted {
      writeln!(f, "  halted:            {reason}")?;
    }
    Ok(())
  }
}
