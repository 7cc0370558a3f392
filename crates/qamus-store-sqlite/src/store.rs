//! [`SqliteStore`], the SQLite implementation of [`LexiconStore`].

use std::{collections::HashSet, path::Path, time::Duration};

use qamus_core::{
  arabic::normalize_search_key,
  entry::{Coverage, Entry, EntryWrite, NewEntry},
  store::{IndexCounts, IndexState, KnownRoot, LexiconStore},
};
use rusqlite::{OpenFlags, OptionalExtension as _, TransactionBehavior};

use crate::{
  encode::{EncodedOutcome, EncodedWrite, ENTRY_COLUMNS, RawEntry, decode_source},
  schema::{
    ATTACH_TRIGGERS, CREATE_INDEX_TABLE, DETACH_TRIGGERS, ENTRY_COLUMNS as REQUIRED_COLUMNS,
    INDEXES, REBUILD_INDEX, SCHEMA, TRIGGER_NAMES,
  },
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// The lexicon backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open an existing store at `path` and bootstrap its schema.
  ///
  /// Fails with [`Error::StoreMissing`] rather than creating an empty file.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    if !path.is_file() {
      return Err(Error::StoreMissing(path.to_path_buf()));
    }
    let conn = tokio_rusqlite::Connection::open_with_flags(
      path,
      OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .await?;
    Self::bootstrap(conn).await
  }

  /// Open the store at `path`, creating the file if it does not exist.
  pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::bootstrap(conn).await
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::bootstrap(conn).await
  }

  /// How long a statement waits on a lock held elsewhere before failing
  /// with SQLITE_BUSY.
  pub async fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.busy_timeout(timeout)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn bootstrap(conn: tokio_rusqlite::Connection) -> Result<Self> {
    let (added, index_created) = conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;

        let existing: HashSet<String> = {
          let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('entries')")?;
          stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?
        };

        let mut added = vec![];
        for (name, decl) in REQUIRED_COLUMNS {
          if !existing.contains(*name) {
            conn.execute_batch(&format!("ALTER TABLE entries ADD COLUMN {name} {decl}"))?;
            added.push(*name);
          }
        }

        conn.execute_batch(INDEXES)?;

        let has_index: bool = conn.query_row(
          "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE name = 'entries_fts')",
          [],
          |row| row.get(0),
        )?;

        if !has_index {
          let tx = conn.transaction()?;
          tx.execute_batch(CREATE_INDEX_TABLE)?;
          tx.execute_batch(REBUILD_INDEX)?;
          tx.execute_batch(ATTACH_TRIGGERS)?;
          tx.commit()?;
        }

        Ok((added, !has_index))
      })
      .await?;

    if !added.is_empty() {
      tracing::info!(columns = ?added, "added missing entry columns");
    }
    if index_created {
      tracing::info!("created and attached search index");
    }

    Ok(Self { conn })
  }
}

#[cfg(test)]
impl SqliteStore {
  /// Run arbitrary SQL against the connection; tests use it to fake legacy
  /// rows and broken trigger sets.
  pub(crate) async fn execute_raw(&self, sql: &'static str) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Write helpers ───────────────────────────────────────────────────────────

fn apply_write(tx: &rusqlite::Transaction<'_>, write: &EncodedWrite) -> rusqlite::Result<()> {
  if let Some(a) = &write.analysis {
    tx.prepare_cached(
      "UPDATE entries SET
         camel_lemmas = ?1, camel_roots = ?2, camel_pos = ?3,
         camel_confidence = ?4, camel_analyzed = 1
       WHERE id = ?5",
    )?
    .execute(rusqlite::params![a.lemmas, a.roots, a.pos, a.confidence, write.id])?;
  }

  match &write.outcome {
    EncodedOutcome::Enriched { root, source } => {
      // The root guard keeps authoritative roots intact even if one was set
      // after the page was read.
      tx.prepare_cached(
        "UPDATE entries
         SET root = ?1, root_source = ?2, enrichment_state = 'enriched'
         WHERE id = ?3 AND (root IS NULL OR trim(root) = '')",
      )?
      .execute(rusqlite::params![root, source, write.id])?;
    }
    EncodedOutcome::Deferred => {
      tx.prepare_cached(
        "UPDATE entries SET enrichment_attempts = enrichment_attempts + 1
         WHERE id = ?1 AND enrichment_state = 'pending'",
      )?
      .execute(rusqlite::params![write.id])?;
    }
    EncodedOutcome::Skipped => {
      tx.prepare_cached(
        "UPDATE entries
         SET enrichment_attempts = enrichment_attempts + 1, enrichment_state = 'skipped'
         WHERE id = ?1 AND enrichment_state = 'pending'",
      )?
      .execute(rusqlite::params![write.id])?;
    }
  }
  Ok(())
}

// ─── LexiconStore impl ───────────────────────────────────────────────────────

impl LexiconStore for SqliteStore {
  type Error = Error;

  // ── Entries ───────────────────────────────────────────────────────────────

  async fn insert_entry(&self, entry: NewEntry) -> Result<Entry> {
    let lemma_norm = normalize_search_key(&entry.lemma);
    let data = entry
      .definition
      .as_ref()
      .map(|d| serde_json::to_string(&serde_json::json!({ "definition": d })))
      .transpose()?;

    let raw: RawEntry = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO entries (lemma, lemma_norm, root, pattern, pos, data, source)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            entry.lemma,
            lemma_norm,
            entry.root,
            entry.pattern,
            entry.pos,
            data,
            entry.source,
          ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(conn.query_row(
          &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?1"),
          rusqlite::params![id],
          RawEntry::from_row,
        )?)
      })
      .await?;

    raw.into_entry()
  }

  async fn get_entry(&self, id: i64) -> Result<Option<Entry>> {
    let raw: Option<RawEntry> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?1"),
            rusqlite::params![id],
            RawEntry::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawEntry::into_entry).transpose()
  }

  async fn pending_page(&self, after_id: i64, limit: usize) -> Result<Vec<Entry>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws: Vec<RawEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(&format!(
          "SELECT {ENTRY_COLUMNS} FROM entries
           WHERE enrichment_state = 'pending'
             AND (root IS NULL OR trim(root) = '')
             AND id > ?1
           ORDER BY id
           LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![after_id, limit], RawEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEntry::into_entry).collect()
  }

  async fn known_roots(&self) -> Result<Vec<KnownRoot>> {
    let rows = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT root, root_source, MIN(id) FROM entries
           WHERE root IS NOT NULL AND trim(root) != ''
           GROUP BY root, root_source",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?, row.get::<_, i64>(2)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(root, source, first_id)| -> Result<KnownRoot> {
        Ok(KnownRoot {
          root,
          source: source.as_deref().map(decode_source).transpose()?,
          first_id,
        })
      })
      .collect()
  }

  async fn commit_page(&self, writes: &[EntryWrite]) -> Result<()> {
    let encoded = writes
      .iter()
      .map(EncodedWrite::encode)
      .collect::<Result<Vec<_>>>()?;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        for write in &encoded {
          apply_write(&tx, write)?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn commit_one(&self, write: &EntryWrite) -> Result<()> {
    let encoded = EncodedWrite::encode(write)?;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        apply_write(&tx, &encoded)?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn reset_skipped(&self) -> Result<u64> {
    let changed = self
      .conn
      .call(|conn| {
        Ok(conn.execute(
          "UPDATE entries SET enrichment_state = 'pending', enrichment_attempts = 0
           WHERE enrichment_state = 'skipped'",
          [],
        )?)
      })
      .await?;
    Ok(changed as u64)
  }

  async fn coverage(&self) -> Result<Coverage> {
    let (total, with_root, pending, enriched, skipped): (i64, i64, i64, i64, i64) = self
      .conn
      .call(|conn| {
        Ok(conn.query_row(
          "SELECT
             COUNT(*),
             COALESCE(SUM(root IS NOT NULL AND trim(root) != ''), 0),
             COALESCE(SUM(enrichment_state = 'pending'), 0),
             COALESCE(SUM(enrichment_state = 'enriched'), 0),
             COALESCE(SUM(enrichment_state = 'skipped'), 0)
           FROM entries",
          [],
          |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
        )?)
      })
      .await?;

    Ok(Coverage {
      total:     total as u64,
      with_root: with_root as u64,
      pending:   pending as u64,
      enriched:  enriched as u64,
      skipped:   skipped as u64,
    })
  }

  // ── Search index ──────────────────────────────────────────────────────────

  async fn index_state(&self) -> Result<IndexState> {
    let present: i64 = self
      .conn
      .call(|conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM sqlite_master
           WHERE type = 'trigger' AND tbl_name = 'entries'
             AND name IN (?1, ?2, ?3)",
          rusqlite::params![TRIGGER_NAMES[0], TRIGGER_NAMES[1], TRIGGER_NAMES[2]],
          |row| row.get(0),
        )?)
      })
      .await?;

    Ok(match present {
      0 => IndexState::Detached,
      n if n == TRIGGER_NAMES.len() as i64 => IndexState::Attached,
      _ => IndexState::Partial,
    })
  }

  async fn detach_index(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute_batch(DETACH_TRIGGERS)?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    tracing::debug!("search index triggers detached");
    Ok(())
  }

  async fn attach_index(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        // Drop first so a partially detached set is replaced as a whole.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute_batch(DETACH_TRIGGERS)?;
        tx.execute_batch(ATTACH_TRIGGERS)?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    tracing::debug!("search index triggers attached");
    Ok(())
  }

  async fn rebuild_index(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute_batch(REBUILD_INDEX)?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn index_counts(&self) -> Result<IndexCounts> {
    let (entries, indexed): (i64, i64) = self
      .conn
      .call(|conn| {
        Ok(conn.query_row(
          "SELECT (SELECT COUNT(*) FROM entries), (SELECT COUNT(*) FROM entries_fts)",
          [],
          |row| Ok((row.get(0)?, row.get(1)?)),
        )?)
      })
      .await?;
    Ok(IndexCounts { entries: entries as u64, indexed: indexed as u64 })
  }

  async fn search_root(&self, root: &str) -> Result<Vec<i64>> {
    let query = format!("root : \"{}\"", root.replace('"', "\"\""));

    let ids = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT rowid FROM entries_fts WHERE entries_fts MATCH ?1 ORDER BY rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![query], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(ids)
  }
}
