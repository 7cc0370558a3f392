//! The `LexiconStore` trait and the search-index state it exposes.
//!
//! Implemented by storage backends (e.g. `qamus-store-sqlite`). The
//! enrichment pipeline depends on this abstraction, not on a concrete
//! backend.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{
  candidate::CandidateSource,
  entry::{Coverage, Entry, EntryWrite, NewEntry},
};

// ─── Index state ─────────────────────────────────────────────────────────────

/// Whether the search index is kept in sync with the entry table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexState {
  /// All three synchronisation triggers exist; the index is live.
  Attached,
  /// No triggers; writes do not reach the index.
  Detached,
  /// Some but not all triggers exist, e.g. after an interrupted detach.
  Partial,
}

/// Row counts on both sides of the search projection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexCounts {
  pub entries: u64,
  pub indexed: u64,
}

impl IndexCounts {
  pub fn is_consistent(&self) -> bool { self.entries == self.indexed }
}

// ─── Roots ───────────────────────────────────────────────────────────────────

/// A root already held by at least one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownRoot {
  pub root:     String,
  /// `None` for roots that came with the data; otherwise the strategy that
  /// filled them in.
  pub source:   Option<CandidateSource>,
  /// Lowest id of an entry holding this root with this source.
  pub first_id: i64,
}

impl KnownRoot {
  /// Whether the root may corroborate a candidate for entry `id`. Imported
  /// roots always may; enriched roots only for entries after the first one
  /// that received them.
  pub fn visible_to(&self, id: i64) -> bool {
    self.source.is_none() || self.first_id < id
  }
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// What the pipeline needs to know about a backend error.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// Lock contention that may clear if the operation is retried.
  fn is_busy(&self) -> bool;
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the persistent entry table and its search projection.
///
/// The store assumes a single writer. Readers in other processes may hold
/// locks for bounded periods, surfacing as errors where
/// [`StoreError::is_busy`] is true.
pub trait LexiconStore: Send + Sync {
  type Error: StoreError;

  // ── Entries ───────────────────────────────────────────────────────────

  /// Insert an entry and return it with its assigned id.
  fn insert_entry(
    &self,
    entry: NewEntry,
  ) -> impl Future<Output = Result<Entry, Self::Error>> + Send + '_;

  fn get_entry(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Entry>, Self::Error>> + Send + '_;

  /// Up to `limit` `Pending` entries without a root and with `id > after_id`,
  /// in ascending id order.
  fn pending_page(
    &self,
    after_id: i64,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Entry>, Self::Error>> + Send + '_;

  /// Non-blank roots currently stored, one per distinct root and source.
  fn known_roots(
    &self,
  ) -> impl Future<Output = Result<Vec<KnownRoot>, Self::Error>> + Send + '_;

  /// Apply all writes in one transaction; nothing is applied on error.
  ///
  /// A write never replaces a non-blank root.
  fn commit_page<'a>(
    &'a self,
    writes: &'a [EntryWrite],
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Apply one write in its own transaction.
  fn commit_one<'a>(
    &'a self,
    write: &'a EntryWrite,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Return every `Skipped` entry to `Pending` with its attempts cleared.
  /// Returns the number of entries reset.
  fn reset_skipped(
    &self,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn coverage(
    &self,
  ) -> impl Future<Output = Result<Coverage, Self::Error>> + Send + '_;

  // ── Search index ──────────────────────────────────────────────────────

  fn index_state(
    &self,
  ) -> impl Future<Output = Result<IndexState, Self::Error>> + Send + '_;

  /// Remove the synchronisation triggers.
  fn detach_index(
    &self,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// (Re)create the synchronisation triggers. Rows written while detached
  /// are not replayed.
  fn attach_index(
    &self,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Rebuild the whole projection from the entry table.
  fn rebuild_index(
    &self,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn index_counts(
    &self,
  ) -> impl Future<Output = Result<IndexCounts, Self::Error>> + Send + '_;

  /// Ids of indexed entries whose projected root matches `root` as a phrase.
  fn search_root<'a>(
    &'a self,
    root: &'a str,
  ) -> impl Future<Output = Result<Vec<i64>, Self::Error>> + Send + 'a;
}
