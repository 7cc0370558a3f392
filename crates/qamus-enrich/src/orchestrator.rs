//! The batch orchestrator: pages through pending entries, decides a root for
//! each, and commits every page with the search index detached.

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use qamus_core::{
  analysis::{Analyzer, ExternalAnalysis},
  candidate::CandidateSource,
  entry::{Coverage, Entry, EntryWrite, WriteOutcome},
  store::LexiconStore,
};
use tracing::Instrument as _;
use uuid::Uuid;

use crate::{
  Result,
  batch::{EnrichmentBatch, Rejected, Unresolved},
  config::{EnrichOptions, RetryPolicy},
  generator::CandidateGenerator,
  index::IndexManager,
  retry::retry_busy,
  stats::EnrichmentStats,
  validator::{RootCorpus, validate},
};

// ─── Stop signal ─────────────────────────────────────────────────────────────

/// Asks a running [`Orchestrator`] to halt after the page it is on.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
  pub fn request(&self) { self.0.store(true, Ordering::SeqCst); }

  pub fn is_requested(&self) -> bool { self.0.load(Ordering::SeqCst) }
}

// ─── Orchestrator ────────────────────────────────────────────────────────────

pub struct Orchestrator<S, A> {
  store:     S,
  analyzer:  A,
  options:   EnrichOptions,
  generator: CandidateGenerator,
  index:     IndexManager,
  stop:      StopHandle,
}

impl<S: LexiconStore, A: Analyzer> Orchestrator<S, A> {
  pub fn new(store: S, analyzer: A, options: EnrichOptions) -> Self {
    Self {
      generator: CandidateGenerator::new(&options.strategies),
      index: IndexManager::new(options.retry.clone()),
      stop: StopHandle::default(),
      store,
      analyzer,
      options,
    }
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn options(&self) -> &EnrichOptions { &self.options }

  pub fn stop_handle(&self) -> StopHandle { self.stop.clone() }

  /// Enrich pending entries until none are left, `max_entries` is reached, a
  /// stop is requested or the store stops answering.
  ///
  /// Only a failure to restore the search index is returned as an error, and
  /// it carries the statistics gathered up to that point. Everything else
  /// ends up in the statistics.
  pub async fn run(&self) -> Result<EnrichmentStats> {
    let run_id = Uuid::new_v4();
    self
      .run_pages(run_id)
      .instrument(tracing::info_span!("enrich", %run_id))
      .await
  }

  async fn run_pages(&self, run_id: Uuid) -> Result<EnrichmentStats> {
    let options = &self.options;
    let mut stats = EnrichmentStats::new(run_id);
    tracing::info!(
      batch_size = options.batch_size,
      max_entries = ?options.max_entries,
      strategies = ?self.generator.strategies(),
      "enrichment run started"
    );

    if let Err(err) = self.index.recover(&self.store).await {
      stats.finish();
      return Err(err.with_stats(stats));
    }

    if options.reset_skipped {
      match self.store.reset_skipped().await {
        Ok(count) => tracing::info!(entries = count, "returned skipped entries to pending"),
        Err(err) => tracing::warn!(error = %err, "could not reset skipped entries"),
      }
    }

    stats.coverage_before = self.coverage().await;

    let store = &self.store;
    let (roots, _) = retry_busy(&options.retry, "load known roots", move || store.known_roots()).await;
    let (mut corpus, mut held) = match roots {
      Ok(roots) => RootCorpus::seed(roots),
      Err(err) => {
        tracing::error!(error = %err, "could not load known roots");
        stats.halted = Some(format!("could not load known roots: {err}"));
        return self.finish(stats).await;
      }
    };
    tracing::info!(roots = corpus.len(), held = held.len(), "loaded root corpus");

    let mut cursor = 0;
    loop {
      if self.stop.is_requested() {
        tracing::info!(processed = stats.processed, "stop requested; halting between pages");
        stats.stopped_early = true;
        break;
      }

      let limit = match options.max_entries {
        Some(max) => match max.saturating_sub(stats.processed as usize) {
          0 => break,
          remaining => remaining.min(options.batch_size),
        },
        None => options.batch_size,
      };

      let (page, _) = retry_busy(&options.retry, "read page", move || {
        store.pending_page(cursor, limit)
      })
      .await;
      let page = match page {
        Ok(page) => page,
        Err(err) => {
          tracing::error!(after_id = cursor, error = %err, "could not read next page");
          stats.halted = Some(format!("could not read entries after id {cursor}: {err}"));
          break;
        }
      };
      let Some(last_id) = page.last().map(|e| e.id) else {
        break;
      };

      let mut batch = EnrichmentBatch::new(cursor, page.len());
      cursor = last_id;
      for entry in page {
        corpus.release(&mut held, entry.id);
        self.plan(entry, &mut corpus, &mut batch);
      }

      let committed = self
        .index
        .scoped(store, commit(store, &options.retry, &batch.writes))
        .await;
      let report = match committed {
        Ok(report) => report,
        Err(err) => {
          tracing::error!(
            pages = stats.pages,
            processed = stats.processed,
            accepted = stats.accepted,
            "aborting run: search index could not be restored"
          );
          stats.coverage_after = self.coverage().await;
          stats.finish();
          return Err(err.with_stats(stats));
        }
      };

      batch.errors = report.failed;
      stats.page_retries += u64::from(report.page_retries);
      if report.fell_back {
        stats.row_fallbacks += 1;
      }
      stats.absorb(&batch);

      tracing::info!(
        page = stats.pages,
        after_id = batch.offset,
        size = batch.size,
        accepted = batch.accepted.len(),
        rejected = batch.unresolved.len(),
        errors = batch.errors.len(),
        processed = stats.processed,
        "page committed"
      );
    }

    self.finish(stats).await
  }

  /// Decide the outcome for one entry and queue its write.
  fn plan(&self, mut entry: Entry, corpus: &mut RootCorpus, batch: &mut EnrichmentBatch) {
    let wants_analysis = entry.analysis.is_none()
      && self.options.analyze_missing
      && self.analyzer.is_available()
      && self.generator.strategies().contains(&CandidateSource::ExternalAnalyzer);

    let fresh = if wants_analysis {
      batch.analyzer_calls += 1;
      ExternalAnalysis::from_output(self.analyzer.analyze(&entry.lemma))
    } else {
      None
    };
    if let Some(analysis) = &fresh {
      entry.analysis = Some(analysis.clone());
    }

    let candidates = self.generator.generate(&entry);
    let mut accepted = None;
    let mut malformed = false;

    for candidate in &candidates {
      match validate(candidate, corpus) {
        Ok(root) => {
          accepted = Some((root, candidate.source));
          break;
        }
        Err(reason) => {
          tracing::debug!(
            id = entry.id,
            lemma = %entry.lemma,
            candidate = %candidate.text,
            source = %candidate.source,
            stage = "validate",
            %reason,
            "candidate rejected"
          );
          malformed |= reason.is_malformed();
          batch.rejected.push(Rejected { id: entry.id, candidate: candidate.clone(), reason });
        }
      }
    }

    let no_candidates = candidates.is_empty();
    batch.candidates.extend(candidates);

    match accepted {
      Some((root, source)) => {
        corpus.insert(root.as_str());
        batch.accept(EntryWrite {
          id:       entry.id,
          outcome:  WriteOutcome::Enriched { root, source },
          analysis: fresh,
        });
      }
      None => {
        let why = if no_candidates {
          Unresolved::NoCandidate
        } else if malformed {
          Unresolved::Malformed
        } else {
          Unresolved::LowConfidence
        };
        let outcome = if entry.attempts.saturating_add(1) >= self.options.max_attempts {
          WriteOutcome::Skipped
        } else {
          WriteOutcome::Deferred
        };
        batch.leave_unresolved(EntryWrite { id: entry.id, outcome, analysis: fresh }, why);
      }
    }
  }

  async fn finish(&self, mut stats: EnrichmentStats) -> Result<EnrichmentStats> {
    if self.options.rebuild_index {
      match self.index.rebuild(&self.store).await {
        Ok(()) => stats.index_rebuilt = true,
        Err(err) => tracing::warn!(error = %err, "search index rebuild failed"),
      }
    }

    match self.store.index_counts().await {
      Ok(counts) => {
        if !counts.is_consistent() {
          tracing::warn!(entries = counts.entries, indexed = counts.indexed, "search index row count differs");
        }
        stats.index = Some(counts);
      }
      Err(err) => tracing::warn!(error = %err, "could not count search index rows"),
    }

    stats.coverage_after = self.coverage().await;
    stats.finish();

    tracing::info!(
      processed = stats.processed,
      accepted = stats.accepted,
      acceptance_rate = stats.acceptance_rate(),
      errors = stats.errors,
      "enrichment run finished"
    );
    Ok(stats)
  }

  async fn coverage(&self) -> Option<Coverage> {
    match self.store.coverage().await {
      Ok(coverage) => Some(coverage),
      Err(err) => {
        tracing::warn!(error = %err, "could not read root coverage");
        None
      }
    }
  }
}

// ─── Commit ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct CommitReport {
  page_retries: u32,
  fell_back:    bool,
  failed:       Vec<i64>,
}

/// Commit a page in one transaction, retrying while the store is busy. If
/// that keeps failing, commit row by row so one bad row only costs itself.
async fn commit<S: LexiconStore>(
  store: &S,
  retry: &RetryPolicy,
  writes: &[EntryWrite],
) -> CommitReport {
  let (result, page_retries) =
    retry_busy(retry, "commit page", move || store.commit_page(writes)).await;
  let mut report = CommitReport { page_retries, ..CommitReport::default() };

  let Err(err) = result else {
    return report;
  };
  tracing::warn!(error = %err, rows = writes.len(), "page commit failed; committing rows one by one");
  report.fell_back = true;

  for write in writes {
    let (result, _) = retry_busy(retry, "commit row", move || store.commit_one(write)).await;
    if let Err(err) = result {
      tracing::error!(id = write.id, stage = "commit", error = %err, "row commit failed; left pending");
      report.failed.push(write.id);
    }
  }
  report
}
