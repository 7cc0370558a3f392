//! SQL schema for the Qamus SQLite store.
//!
//! Bootstrap is verify-or-populate: tables are created if missing, columns the
//! pipeline needs are added to older `entries` tables, and the search index is
//! created, filled and attached only when it does not exist yet.

/// Base DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS entries (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    lemma               TEXT NOT NULL,
    lemma_norm          TEXT,
    root                TEXT,
    pattern             TEXT,
    pos                 TEXT,
    data                TEXT,            -- JSON object, e.g. {\"definition\": ...}
    source              TEXT,
    camel_lemmas        TEXT,            -- JSON array
    camel_roots         TEXT,            -- JSON array
    camel_pos           TEXT,            -- JSON array
    camel_confidence    REAL,
    camel_analyzed      INTEGER DEFAULT 0,
    root_source         TEXT,            -- 'external' | 'pattern' when filled by enrichment
    enrichment_state    TEXT NOT NULL DEFAULT 'pending',
    enrichment_attempts INTEGER NOT NULL DEFAULT 0
);
";

/// Columns that older `entries` tables may lack, with their declarations.
pub const ENTRY_COLUMNS: &[(&str, &str)] = &[
  ("lemma_norm", "TEXT"),
  ("pattern", "TEXT"),
  ("data", "TEXT"),
  ("source", "TEXT"),
  ("camel_lemmas", "TEXT"),
  ("camel_roots", "TEXT"),
  ("camel_pos", "TEXT"),
  ("camel_confidence", "REAL"),
  ("camel_analyzed", "INTEGER DEFAULT 0"),
  ("root_source", "TEXT"),
  ("enrichment_state", "TEXT NOT NULL DEFAULT 'pending'"),
  ("enrichment_attempts", "INTEGER NOT NULL DEFAULT 0"),
];

/// Secondary indexes; run after [`ENTRY_COLUMNS`] are in place.
pub const INDEXES: &str = "
CREATE INDEX IF NOT EXISTS entries_enrichment_idx ON entries(enrichment_state, id);
CREATE INDEX IF NOT EXISTS entries_root_idx       ON entries(root);
";

pub const CREATE_INDEX_TABLE: &str = "
CREATE VIRTUAL TABLE entries_fts USING fts5(
    lemma_norm, root, pattern, pos, definition, source
);
";

pub const TRIGGER_NAMES: [&str; 3] = ["entries_ai", "entries_ad", "entries_au"];

/// The synchronisation triggers. Existing index tooling depends on these
/// bodies; keep them byte-for-byte.
pub const ATTACH_TRIGGERS: &str = "
CREATE TRIGGER entries_ai AFTER INSERT ON entries BEGIN
    INSERT INTO entries_fts(rowid, lemma_norm, root, pattern, pos, definition, source)
    VALUES (new.id, new.lemma_norm, new.root, new.pattern, new.pos,
            COALESCE(json_extract(new.data, '$.definition'), ''), new.source);
END;

CREATE TRIGGER entries_ad AFTER DELETE ON entries BEGIN
    DELETE FROM entries_fts WHERE rowid = old.id;
END;

CREATE TRIGGER entries_au AFTER UPDATE ON entries BEGIN
    DELETE FROM entries_fts WHERE rowid = old.id;
    INSERT INTO entries_fts(rowid, lemma_norm, root, pattern, pos, definition, source)
    VALUES (new.id, new.lemma_norm, new.root, new.pattern, new.pos,
            COALESCE(json_extract(new.data, '$.definition'), ''), new.source);
END;
";

pub const DETACH_TRIGGERS: &str = "
DROP TRIGGER IF EXISTS entries_ai;
DROP TRIGGER IF EXISTS entries_ad;
DROP TRIGGER IF EXISTS entries_au;
";

/// Replace the whole projection with the current entry rows.
pub const REBUILD_INDEX: &str = "
DELETE FROM entries_fts;
INSERT INTO entries_fts(rowid, lemma_norm, root, pattern, pos, definition, source)
SELECT id, lemma_norm, root, pattern, pos,
       COALESCE(json_extract(data, '$.definition'), ''), source
FROM entries;
";
