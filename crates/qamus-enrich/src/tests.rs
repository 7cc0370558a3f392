//! End-to-end pipeline tests against an in-memory `SqliteStore`, optionally
//! wrapped in [`FaultyStore`] to inject lock contention and failures.

use std::{
  collections::{HashMap, HashSet},
  sync::Mutex,
};

use qamus_core::{
  analysis::{Analyzer, AnalyzerOutput, UnavailableAnalyzer},
  entry::{Coverage, EnrichmentState, Entry, EntryWrite, NewEntry},
  store::{IndexCounts, IndexState, KnownRoot, LexiconStore, StoreError},
};
use qamus_store_sqlite::SqliteStore;

use crate::{EnrichOptions, Error, Orchestrator, RetryPolicy, TableAnalyzer};

// ─── Fixtures ────────────────────────────────────────────────────────────────

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn options() -> EnrichOptions {
  EnrichOptions {
    retry: RetryPolicy { attempts: 3, base_delay_ms: 1 },
    ..EnrichOptions::default()
  }
}

fn analyses(pairs: &[(&str, &str)]) -> TableAnalyzer {
  TableAnalyzer::new(
    pairs
      .iter()
      .map(|(word, root)| {
        ((*word).to_owned(), AnalyzerOutput {
          roots: vec![(*root).to_owned()],
          morphology_count: 4,
          available: true,
          ..AnalyzerOutput::default()
        })
      })
      .collect(),
  )
}

/// Answers every word with the same root.
struct FixedAnalyzer(&'static str);

impl Analyzer for FixedAnalyzer {
  fn analyze(&self, _word: &str) -> AnalyzerOutput {
    AnalyzerOutput {
      roots: vec![self.0.to_owned()],
      morphology_count: 10,
      available: true,
      ..AnalyzerOutput::default()
    }
  }
}

async fn insert(store: &SqliteStore, lemma: &str, root: Option<&str>) -> Entry {
  let mut entry = NewEntry::new(lemma);
  entry.root = root.map(str::to_owned);
  store.insert_entry(entry).await.unwrap()
}

async fn reload(store: &SqliteStore, id: i64) -> Entry { store.get_entry(id).await.unwrap().unwrap() }

// ─── Fault injection ─────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
enum FaultError {
  #[error("injected: database is locked")]
  Busy,
  #[error("injected: schema mismatch")]
  Broken,
  #[error(transparent)]
  Store(#[from] qamus_store_sqlite::Error),
}

impl StoreError for FaultError {
  fn is_busy(&self) -> bool {
    match self {
      FaultError::Busy => true,
      FaultError::Broken => false,
      FaultError::Store(err) => err.is_busy(),
    }
  }
}

#[derive(Debug, Default)]
struct Faults {
  /// Page commits that report busy before succeeding.
  busy_page_commits: u32,
  /// Every page commit fails.
  break_page_commits: bool,
  /// Rows whose single-row commit fails.
  broken_rows: HashSet<i64>,
  /// The attach call (1-based) from which attaching fails.
  break_attach_from: Option<u32>,
  attach_calls: u32,
  page_commits: u32,
}

/// Delegates to a real store, failing the operations configured in
/// [`Faults`].
struct FaultyStore {
  inner:  SqliteStore,
  faults: Mutex<Faults>,
}

impl FaultyStore {
  fn new(inner: SqliteStore, faults: Faults) -> Self { Self { inner, faults: Mutex::new(faults) } }

  fn page_commit_fault(&self) -> Option<FaultError> {
    let mut faults = self.faults.lock().unwrap();
    faults.page_commits += 1;
    if faults.busy_page_commits > 0 {
      faults.busy_page_commits -= 1;
      return Some(FaultError::Busy);
    }
    faults.break_page_commits.then_some(FaultError::Broken)
  }

  fn row_commit_fault(&self, id: i64) -> Option<FaultError> {
    let faults = self.faults.lock().unwrap();
    faults.broken_rows.contains(&id).then_some(FaultError::Broken)
  }

  fn attach_fault(&self) -> Option<FaultError> {
    let mut faults = self.faults.lock().unwrap();
    faults.attach_calls += 1;
    match faults.break_attach_from {
      Some(from) if faults.attach_calls >= from => Some(FaultError::Broken),
      _ => None,
    }
  }

  fn page_commits(&self) -> u32 { self.faults.lock().unwrap().page_commits }
}

impl LexiconStore for FaultyStore {
  type Error = FaultError;

  async fn insert_entry(&self, entry: NewEntry) -> Result<Entry, FaultError> {
    Ok(self.inner.insert_entry(entry).await?)
  }

  async fn get_entry(&self, id: i64) -> Result<Option<Entry>, FaultError> {
    Ok(self.inner.get_entry(id).await?)
  }

  async fn pending_page(&self, after_id: i64, limit: usize) -> Result<Vec<Entry>, FaultError> {
    Ok(self.inner.pending_page(after_id, limit).await?)
  }

  async fn known_roots(&self) -> Result<Vec<KnownRoot>, FaultError> {
    Ok(self.inner.known_roots().await?)
  }

  async fn commit_page(&self, writes: &[EntryWrite]) -> Result<(), FaultError> {
    if let Some(err) = self.page_commit_fault() {
      return Err(err);
    }
    Ok(self.inner.commit_page(writes).await?)
  }

  async fn commit_one(&self, write: &EntryWrite) -> Result<(), FaultError> {
    if let Some(err) = self.row_commit_fault(write.id) {
      return Err(err);
    }
    Ok(self.inner.commit_one(write).await?)
  }

  async fn reset_skipped(&self) -> Result<u64, FaultError> { Ok(self.inner.reset_skipped().await?) }

  async fn coverage(&self) -> Result<Coverage, FaultError> { Ok(self.inner.coverage().await?) }

  async fn index_state(&self) -> Result<IndexState, FaultError> {
    Ok(self.inner.index_state().await?)
  }

  async fn detach_index(&self) -> Result<(), FaultError> { Ok(self.inner.detach_index().await?) }

  async fn attach_index(&self) -> Result<(), FaultError> {
    if let Some(err) = self.attach_fault() {
      return Err(err);
    }
    Ok(self.inner.attach_index().await?)
  }

  async fn rebuild_index(&self) -> Result<(), FaultError> { Ok(self.inner.rebuild_index().await?) }

  async fn index_counts(&self) -> Result<IndexCounts, FaultError> {
    Ok(self.inner.index_counts().await?)
  }

  async fn search_root(&self, root: &str) -> Result<Vec<i64>, FaultError> {
    Ok(self.inner.search_root(root).await?)
  }
}

// ─── Scenarios ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn analyzer_root_enriches_entry() {
  let s = store().await;
  let e = insert(&s, "كَتَبَ", None).await;

  let orchestrator = Orchestrator::new(s, analyses(&[("كَتَبَ", "ك ت ب")]), options());
  let stats = orchestrator.run().await.unwrap();

  let entry = reload(orchestrator.store(), e.id).await;
  assert_eq!(entry.root.as_deref(), Some("ك ت ب"));
  assert_eq!(entry.state, EnrichmentState::Enriched);

  let analysis = entry.analysis.expect("analysis cached");
  assert_eq!(analysis.roots, vec!["ك ت ب"]);
  assert_eq!(analysis.confidence, 0.4);

  assert_eq!(stats.processed, 1);
  assert_eq!(stats.accepted_external, 1);
  assert_eq!(stats.analyzer_calls, 1);
}

#[tokio::test]
async fn heuristic_candidate_resolves_to_corpus_root() {
  let s = store().await;
  insert(&s, "درس", Some("د ر س")).await;
  let e = insert(&s, "المدرسة", None).await;

  let orchestrator = Orchestrator::new(s, UnavailableAnalyzer, options());
  let stats = orchestrator.run().await.unwrap();

  let entry = reload(orchestrator.store(), e.id).await;
  assert_eq!(entry.root.as_deref(), Some("د ر س"));
  assert_eq!(entry.state, EnrichmentState::Enriched);
  assert!(entry.analysis.is_none());
  assert_eq!(stats.accepted_pattern, 1);
  assert_eq!(stats.analyzer_calls, 0);
}

#[tokio::test]
async fn uncorroborated_candidate_stays_pending() {
  let s = store().await;
  insert(&s, "درس", Some("د ر س")).await;
  let e = insert(&s, "qwerty", None).await;

  let orchestrator = Orchestrator::new(s, UnavailableAnalyzer, options());
  let stats = orchestrator.run().await.unwrap();

  let entry = reload(orchestrator.store(), e.id).await;
  assert_eq!(entry.root, None);
  assert_eq!(entry.state, EnrichmentState::Pending);
  assert_eq!(entry.attempts, 1);
  assert_eq!(stats.accepted, 0);
  assert_eq!(stats.rejected_low_confidence, 1);
}

#[tokio::test]
async fn busy_first_commit_is_retried() {
  let s = store().await;
  let mut ids = vec![];
  for i in 0..100 {
    ids.push(insert(&s, &format!("كاتب{i}"), None).await.id);
  }

  let faulty = FaultyStore::new(s, Faults { busy_page_commits: 1, ..Faults::default() });
  let orchestrator = Orchestrator::new(faulty, FixedAnalyzer("ك ت ب"), options());
  let stats = orchestrator.run().await.unwrap();

  assert_eq!(stats.processed, 100);
  assert_eq!(stats.accepted, 100);
  assert_eq!(stats.errors, 0);
  assert_eq!(stats.page_retries, 1);
  assert_eq!(stats.row_fallbacks, 0);
  assert_eq!(orchestrator.store().page_commits(), 2);

  let inner = &orchestrator.store().inner;
  for id in ids {
    let entry = reload(inner, id).await;
    assert_eq!(entry.state, EnrichmentState::Enriched);
    assert_eq!(entry.root.as_deref(), Some("ك ت ب"));
  }
  let coverage = inner.coverage().await.unwrap();
  assert_eq!(coverage.total, 100);
  assert_eq!(coverage.enriched, 100);
}

#[tokio::test]
async fn failed_reattach_aborts_but_keeps_committed_pages() {
  let s = store().await;
  let mut ids = vec![];
  for i in 0..4 {
    ids.push(insert(&s, &format!("كاتب{i}"), None).await.id);
  }

  // The index starts attached, so the first attach is page one's; page two's
  // re-attach fails.
  let faulty = FaultyStore::new(s, Faults { break_attach_from: Some(2), ..Faults::default() });
  let orchestrator = Orchestrator::new(
    faulty,
    FixedAnalyzer("ك ت ب"),
    EnrichOptions { batch_size: 2, ..options() },
  );

  let err = orchestrator.run().await.unwrap_err();
  assert!(matches!(err, Error::IndexStateCorruption { .. }));

  // The first page's counts survive the abort for the summary.
  let partial = err.partial_stats().expect("partial stats");
  assert_eq!(partial.pages, 1);
  assert_eq!(partial.processed, 2);
  assert_eq!(partial.accepted, 2);
  assert!(partial.finished_at.is_some());

  let inner = orchestrator.store().inner.clone();
  for id in &ids[..2] {
    assert_eq!(reload(&inner, *id).await.state, EnrichmentState::Enriched);
  }
  assert_eq!(inner.index_state().await.unwrap(), IndexState::Detached);

  // The next run repairs the triggers; a rebuild makes every root searchable.
  let orchestrator = Orchestrator::new(
    inner,
    UnavailableAnalyzer,
    EnrichOptions { rebuild_index: true, ..options() },
  );
  let stats = orchestrator.run().await.unwrap();
  assert!(stats.index_rebuilt);

  let store = orchestrator.store();
  assert_eq!(store.index_state().await.unwrap(), IndexState::Attached);
  assert!(store.index_counts().await.unwrap().is_consistent());
  let mut found = store.search_root("ك ت ب").await.unwrap();
  found.sort_unstable();
  assert_eq!(found, ids);
}

// ─── Properties ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_write_phase_leaves_index_attached() {
  let s = store().await;
  let a = insert(&s, "كاتب", None).await;
  let b = insert(&s, "كتاب", None).await;

  let faulty = FaultyStore::new(s, Faults {
    break_page_commits: true,
    broken_rows: HashSet::from([b.id]),
    ..Faults::default()
  });
  let orchestrator = Orchestrator::new(faulty, FixedAnalyzer("ك ت ب"), options());
  let stats = orchestrator.run().await.unwrap();

  assert_eq!(stats.row_fallbacks, 1);
  assert_eq!(stats.errors, 1);
  assert_eq!(stats.accepted, 1);

  let inner = &orchestrator.store().inner;
  assert_eq!(inner.index_state().await.unwrap(), IndexState::Attached);
  assert_eq!(reload(inner, a.id).await.state, EnrichmentState::Enriched);

  let failed = reload(inner, b.id).await;
  assert_eq!(failed.state, EnrichmentState::Pending);
  assert_eq!(failed.root, None);
  assert_eq!(failed.attempts, 0);
}

#[tokio::test]
async fn second_run_changes_no_roots() {
  let s = store().await;
  insert(&s, "درس", Some("د ر س")).await;
  insert(&s, "المدرسة", None).await;
  insert(&s, "qwerty", None).await;
  insert(&s, "كَتَبَ", None).await;

  let orchestrator = Orchestrator::new(s, analyses(&[("كَتَبَ", "ك ت ب")]), options());
  orchestrator.run().await.unwrap();

  let snapshot = |entries: Vec<Entry>| -> HashMap<i64, Option<String>> {
    entries.into_iter().map(|e| (e.id, e.root)).collect()
  };
  let store = orchestrator.store();
  let mut first = vec![];
  for id in 1..=4 {
    first.push(reload(store, id).await);
  }
  let first_coverage = store.coverage().await.unwrap();

  let stats = orchestrator.run().await.unwrap();
  assert_eq!(stats.accepted, 0);
  // Only the unresolved entry is visited again.
  assert_eq!(stats.processed, 1);

  let mut second = vec![];
  for id in 1..=4 {
    second.push(reload(store, id).await);
  }
  assert_eq!(snapshot(first), snapshot(second));
  assert_eq!(store.coverage().await.unwrap().total, first_coverage.total);
}

#[tokio::test]
async fn authoritative_roots_are_never_replaced() {
  let s = store().await;
  let a = insert(&s, "كتاب", Some("ك ت ب")).await;
  let b = insert(&s, "مكتبة", Some("ك.ت.ب")).await;
  insert(&s, "درس", None).await;

  let orchestrator = Orchestrator::new(s, FixedAnalyzer("ز ز ز"), options());
  let stats = orchestrator.run().await.unwrap();
  assert_eq!(stats.processed, 1);

  let store = orchestrator.store();
  assert_eq!(reload(store, a.id).await.root.as_deref(), Some("ك ت ب"));
  assert_eq!(reload(store, b.id).await.root.as_deref(), Some("ك.ت.ب"));
}

#[tokio::test]
async fn rebuilt_index_finds_new_roots() {
  let s = store().await;
  let e = insert(&s, "عالم", None).await;
  insert(&s, "كتب", Some("ك ت ب")).await;

  let orchestrator = Orchestrator::new(
    s,
    UnavailableAnalyzer,
    EnrichOptions { rebuild_index: true, ..options() },
  );
  let stats = orchestrator.run().await.unwrap();

  let counts = stats.index.unwrap();
  assert!(counts.is_consistent());
  assert_eq!(counts.entries, 2);

  let store = orchestrator.store();
  assert_eq!(store.search_root("ع ل م").await.unwrap(), vec![e.id]);
  assert_eq!(store.index_state().await.unwrap(), IndexState::Attached);
}

#[tokio::test]
async fn without_rebuild_new_roots_are_not_searchable() {
  let s = store().await;
  insert(&s, "عالم", None).await;

  let orchestrator = Orchestrator::new(s, UnavailableAnalyzer, options());
  let stats = orchestrator.run().await.unwrap();
  assert_eq!(stats.accepted, 1);
  assert!(!stats.index_rebuilt);

  let store = orchestrator.store();
  assert!(store.search_root("ع ل م").await.unwrap().is_empty());
  assert!(store.index_counts().await.unwrap().is_consistent());
}

#[tokio::test]
async fn corpus_grows_within_a_run() {
  // The heuristic candidate for علمx only resolves once ع ل م is known.
  let s = store().await;
  let a = insert(&s, "عالِم", None).await;
  let b = insert(&s, "علمx", None).await;

  let orchestrator = Orchestrator::new(s, analyses(&[("عالِم", "ع ل م")]), options());
  orchestrator.run().await.unwrap();

  let store = orchestrator.store();
  assert_eq!(reload(store, a.id).await.root.as_deref(), Some("ع ل م"));
  assert_eq!(reload(store, b.id).await.root.as_deref(), Some("ع ل م"));
}

#[tokio::test]
async fn processing_order_affects_acceptance() {
  let s = store().await;
  let b = insert(&s, "علمx", None).await;
  insert(&s, "عالِم", None).await;

  let orchestrator = Orchestrator::new(s, analyses(&[("عالِم", "ع ل م")]), options());
  orchestrator.run().await.unwrap();

  let entry = reload(orchestrator.store(), b.id).await;
  assert_eq!(entry.root, None);
  assert_eq!(entry.state, EnrichmentState::Pending);
}

#[tokio::test]
async fn rerun_does_not_use_roots_of_later_entries() {
  // علمx is deferred because ع ل م only arrives with a later entry. The next
  // run must reach the same verdict.
  let s = store().await;
  let b = insert(&s, "علمx", None).await;
  insert(&s, "عالِم", None).await;

  let orchestrator = Orchestrator::new(s, analyses(&[("عالِم", "ع ل م")]), options());
  let first = orchestrator.run().await.unwrap();
  assert_eq!(first.accepted, 1);

  let second = orchestrator.run().await.unwrap();
  assert_eq!(second.processed, 1);
  assert_eq!(second.accepted, 0);

  let entry = reload(orchestrator.store(), b.id).await;
  assert_eq!(entry.root, None);
  assert_eq!(entry.attempts, 2);
}

#[tokio::test]
async fn split_runs_match_a_single_run() {
  // Roots given to earlier entries in a previous run still corroborate.
  let s = store().await;
  insert(&s, "عالِم", None).await;
  let b = insert(&s, "علمx", None).await;

  let orchestrator = Orchestrator::new(
    s,
    analyses(&[("عالِم", "ع ل م")]),
    EnrichOptions { max_entries: Some(1), ..options() },
  );
  assert_eq!(orchestrator.run().await.unwrap().accepted, 1);
  assert_eq!(reload(orchestrator.store(), b.id).await.root, None);

  let stats = orchestrator.run().await.unwrap();
  assert_eq!(stats.accepted_pattern, 1);
  assert_eq!(reload(orchestrator.store(), b.id).await.root.as_deref(), Some("ع ل م"));
}

// ─── Run control ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn repeated_misses_end_in_skipped() {
  let s = store().await;
  let e = insert(&s, "qwerty", None).await;

  let orchestrator = Orchestrator::new(
    s,
    UnavailableAnalyzer,
    EnrichOptions { max_attempts: 2, ..options() },
  );
  orchestrator.run().await.unwrap();
  let stats = orchestrator.run().await.unwrap();
  assert_eq!(stats.skipped, 1);

  let store = orchestrator.store();
  let entry = reload(store, e.id).await;
  assert_eq!(entry.state, EnrichmentState::Skipped);
  assert_eq!(entry.attempts, 2);

  // Skipped entries are not visited again.
  assert_eq!(orchestrator.run().await.unwrap().processed, 0);
}

#[tokio::test]
async fn reset_skipped_revisits_entries() {
  let s = store().await;
  let e = insert(&s, "qwerty", None).await;

  let orchestrator = Orchestrator::new(
    s,
    UnavailableAnalyzer,
    EnrichOptions { max_attempts: 1, ..options() },
  );
  orchestrator.run().await.unwrap();
  assert_eq!(reload(orchestrator.store(), e.id).await.state, EnrichmentState::Skipped);

  let s = orchestrator.store().clone();
  let orchestrator = Orchestrator::new(
    s,
    UnavailableAnalyzer,
    EnrichOptions { max_attempts: 1, reset_skipped: true, ..options() },
  );
  let stats = orchestrator.run().await.unwrap();
  assert_eq!(stats.processed, 1);
  assert_eq!(stats.skipped, 1);
}

#[tokio::test]
async fn max_entries_bounds_the_run() {
  let s = store().await;
  for i in 0..5 {
    insert(&s, &format!("كاتب{i}"), None).await;
  }

  let orchestrator = Orchestrator::new(
    s,
    FixedAnalyzer("ك ت ب"),
    EnrichOptions { batch_size: 2, max_entries: Some(3), ..options() },
  );
  let stats = orchestrator.run().await.unwrap();

  assert_eq!(stats.processed, 3);
  assert_eq!(stats.pages, 2);
  assert_eq!(orchestrator.store().coverage().await.unwrap().pending, 2);
}

#[tokio::test]
async fn stop_request_halts_before_next_page() {
  let s = store().await;
  insert(&s, "كاتب", None).await;

  let orchestrator = Orchestrator::new(s, FixedAnalyzer("ك ت ب"), options());
  orchestrator.stop_handle().request();
  let stats = orchestrator.run().await.unwrap();

  assert!(stats.stopped_early);
  assert_eq!(stats.processed, 0);
  assert_eq!(orchestrator.store().index_state().await.unwrap(), IndexState::Attached);
}

#[tokio::test]
async fn run_recovers_detached_index() {
  let s = store().await;
  s.detach_index().await.unwrap();

  let orchestrator = Orchestrator::new(s, UnavailableAnalyzer, options());
  orchestrator.run().await.unwrap();
  assert_eq!(orchestrator.store().index_state().await.unwrap(), IndexState::Attached);
}

#[tokio::test]
async fn analyses_are_cached_between_runs() {
  let s = store().await;
  let e = insert(&s, "qwerty", None).await;

  let orchestrator = Orchestrator::new(s, analyses(&[]), options());
  assert_eq!(orchestrator.run().await.unwrap().analyzer_calls, 1);

  let entry = reload(orchestrator.store(), e.id).await;
  assert_eq!(entry.state, EnrichmentState::Pending);
  let analysis = entry.analysis.expect("empty analysis is still cached");
  assert!(analysis.roots.is_empty());

  assert_eq!(orchestrator.run().await.unwrap().analyzer_calls, 0);
}

#[tokio::test]
async fn missing_store_is_a_startup_error() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("absent.db");

  let result = crate::open_store(&path, &options()).await;
  assert!(matches!(result, Err(Error::StoreOpen { .. })));
}
