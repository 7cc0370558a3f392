//! An [`Analyzer`] backed by a precomputed table of analyses.
//!
//! The table is a JSON object keyed by word:
//!
//! ```json
//! { "كَتَبَ": { "possible_lemmas": ["كَتَب"], "roots": ["ك ت ب"], "pos_tags": ["verb"], "morphology_count": 4 } }
//! ```

use std::{collections::HashMap, path::Path};

use qamus_core::{
  analysis::{Analyzer, AnalyzerOutput},
  arabic::strip_diacritics,
};

use crate::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct TableAnalyzer {
  table: HashMap<String, AnalyzerOutput>,
}

impl TableAnalyzer {
  pub fn new(table: HashMap<String, AnalyzerOutput>) -> Self { Self { table } }

  pub fn from_path(path: &Path) -> Result<Self> {
    let table_error = |source: Box<dyn std::error::Error + Send + Sync>| Error::AnalysisTable {
      path: path.to_path_buf(),
      source,
    };

    let text = std::fs::read_to_string(path).map_err(|e| table_error(Box::new(e)))?;
    let table: HashMap<String, AnalyzerOutput> =
      serde_json::from_str(&text).map_err(|e| table_error(Box::new(e)))?;

    tracing::info!(path = %path.display(), words = table.len(), "loaded analysis table");
    Ok(Self::new(table))
  }

  pub fn len(&self) -> usize { self.table.len() }

  pub fn is_empty(&self) -> bool { self.table.is_empty() }
}

impl Analyzer for TableAnalyzer {
  /// Looks up the word as written, then without vowel marks.
  fn analyze(&self, word: &str) -> AnalyzerOutput {
    let word = word.trim();
    match self
      .table
      .get(word)
      .or_else(|| self.table.get(&strip_diacritics(word)))
    {
      Some(output) => output.clone(),
      // A miss is an answer with no analyses.
      None => AnalyzerOutput { available: true, ..AnalyzerOutput::default() },
    }
  }
}
