//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Analyzer lists (`camel_*`) are stored as JSON arrays. Enum columns hold the
//! lowercase `strum` names.

use qamus_core::{
  analysis::ExternalAnalysis,
  candidate::CandidateSource,
  entry::{EnrichmentState, Entry, EntryWrite, WriteOutcome},
};

use crate::{Error, Result};

/// Column list matching [`RawEntry::from_row`].
pub const ENTRY_COLUMNS: &str = "id, lemma, root, pos, camel_lemmas, camel_roots, camel_pos, \
   camel_confidence, camel_analyzed, enrichment_state, enrichment_attempts";

// ─── Lists ───────────────────────────────────────────────────────────────────

pub fn encode_list(items: &[String]) -> Result<String> {
  Ok(serde_json::to_string(items)?)
}

/// Decode a stored analyzer list.
///
/// Older rows hold hand-written or truncated values; anything that is not a
/// JSON array of strings is kept whole as a single raw item so the validator
/// can clean or reject it.
pub fn decode_list(raw: &str) -> Vec<String> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return vec![];
  }
  if trimmed.starts_with('[')
    && trimmed.ends_with(']')
    && let Ok(items) = serde_json::from_str::<Vec<String>>(trimmed)
  {
    return items;
  }
  vec![trimmed.to_owned()]
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_state(s: &str) -> Result<EnrichmentState> {
  s.parse()
    .map_err(|_| Error::Core(qamus_core::Error::UnknownEnrichmentState(s.to_owned())))
}

pub fn decode_source(s: &str) -> Result<CandidateSource> {
  s.parse()
    .map_err(|_| Error::Core(qamus_core::Error::UnknownCandidateSource(s.to_owned())))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from an `entries` row.
pub struct RawEntry {
  pub id:                  i64,
  pub lemma:               String,
  pub root:                Option<String>,
  pub pos:                 Option<String>,
  pub camel_lemmas:        Option<String>,
  pub camel_roots:         Option<String>,
  pub camel_pos:           Option<String>,
  pub camel_confidence:    Option<f64>,
  pub camel_analyzed:      Option<i64>,
  pub enrichment_state:    String,
  pub enrichment_attempts: i64,
}

impl RawEntry {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                  row.get(0)?,
      lemma:               row.get(1)?,
      root:                row.get(2)?,
      pos:                 row.get(3)?,
      camel_lemmas:        row.get(4)?,
      camel_roots:         row.get(5)?,
      camel_pos:           row.get(6)?,
      camel_confidence:    row.get(7)?,
      camel_analyzed:      row.get(8)?,
      enrichment_state:    row.get(9)?,
      enrichment_attempts: row.get(10)?,
    })
  }

  pub fn into_entry(self) -> Result<Entry> {
    let has_roots = self
      .camel_roots
      .as_deref()
      .is_some_and(|r| !r.trim().is_empty());

    // A row counts as analysed if the flag is set or roots were imported
    // without it.
    let analysis = if self.camel_analyzed == Some(1) || has_roots {
      Some(ExternalAnalysis {
        possible_lemmas: self.camel_lemmas.as_deref().map(decode_list).unwrap_or_default(),
        roots:           self.camel_roots.as_deref().map(decode_list).unwrap_or_default(),
        pos_tags:        self.camel_pos.as_deref().map(decode_list).unwrap_or_default(),
        confidence:      self.camel_confidence.unwrap_or(0.0).clamp(0.0, 1.0),
      })
    } else {
      None
    };

    Ok(Entry {
      id: self.id,
      lemma: self.lemma,
      root: self.root,
      pos: self.pos,
      analysis,
      state: decode_state(&self.enrichment_state)?,
      attempts: u32::try_from(self.enrichment_attempts.max(0)).unwrap_or(u32::MAX),
    })
  }
}

// ─── Writes ──────────────────────────────────────────────────────────────────

pub struct EncodedAnalysis {
  pub lemmas:     String,
  pub roots:      String,
  pub pos:        String,
  pub confidence: f64,
}

pub enum EncodedOutcome {
  Enriched { root: String, source: String },
  Deferred,
  Skipped,
}

/// An [`EntryWrite`] with every value already in column form, so it can be
/// moved onto the database thread.
pub struct EncodedWrite {
  pub id:       i64,
  pub outcome:  EncodedOutcome,
  pub analysis: Option<EncodedAnalysis>,
}

impl EncodedWrite {
  pub fn encode(write: &EntryWrite) -> Result<Self> {
    let analysis = write
      .analysis
      .as_ref()
      .map(|a| -> Result<EncodedAnalysis> {
        Ok(EncodedAnalysis {
          lemmas:     encode_list(&a.possible_lemmas)?,
          roots:      encode_list(&a.roots)?,
          pos:        encode_list(&a.pos_tags)?,
          confidence: a.confidence,
        })
      })
      .transpose()?;

    let outcome = match &write.outcome {
      WriteOutcome::Enriched { root, source } => EncodedOutcome::Enriched {
        root:   root.as_str().to_owned(),
        source: source.as_ref().to_owned(),
      },
      WriteOutcome::Deferred => EncodedOutcome::Deferred,
      WriteOutcome::Skipped => EncodedOutcome::Skipped,
    };

    Ok(Self { id: write.id, outcome, analysis })
  }
}
