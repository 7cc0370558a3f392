//! The external morphological analyzer capability.
//!
//! The analyzer itself is a black box; the pipeline only sees
//! [`AnalyzerOutput`] and caches the useful part of it as
//! [`ExternalAnalysis`] on the entry.

use serde::{Deserialize, Serialize};

/// Raw answer from an analyzer for one word.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerOutput {
  #[serde(default)]
  pub possible_lemmas:  Vec<String>,
  #[serde(default)]
  pub roots:            Vec<String>,
  #[serde(default)]
  pub pos_tags:         Vec<String>,
  /// Number of morphological analyses the analyzer produced.
  #[serde(default)]
  pub morphology_count: u32,
  /// `false` when the analyzer could not run at all.
  #[serde(default = "available_default")]
  pub available:        bool,
}

fn available_default() -> bool { true }

impl AnalyzerOutput {
  /// The answer of an analyzer that is not installed.
  pub fn unavailable() -> Self {
    Self { available: false, ..Self::default() }
  }
}

/// Analyzer output as cached on an entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalAnalysis {
  pub possible_lemmas: Vec<String>,
  pub roots:           Vec<String>,
  pub pos_tags:        Vec<String>,
  /// In `[0, 1]`.
  pub confidence:      f64,
}

impl ExternalAnalysis {
  /// Keep what the pipeline needs from an available analyzer answer.
  /// Returns `None` for an unavailable analyzer; such answers are never cached.
  pub fn from_output(output: AnalyzerOutput) -> Option<Self> {
    if !output.available {
      return None;
    }
    Some(Self {
      confidence:      confidence_for(output.morphology_count),
      possible_lemmas: output.possible_lemmas,
      roots:           output.roots,
      pos_tags:        output.pos_tags,
    })
  }

  /// First non-blank root, the analyzer's best guess.
  pub fn best_root(&self) -> Option<&str> {
    self
      .roots
      .iter()
      .map(|r| r.trim())
      .find(|r| !r.is_empty())
  }
}

/// Ten or more analyses is full confidence.
pub fn confidence_for(morphology_count: u32) -> f64 {
  (f64::from(morphology_count) / 10.0).min(1.0)
}

/// A morphological analyzer. Implementations must not fail: an analyzer that
/// cannot answer returns [`AnalyzerOutput::unavailable`].
pub trait Analyzer: Send + Sync {
  fn analyze(&self, word: &str) -> AnalyzerOutput;

  /// Whether calling [`Analyzer::analyze`] can produce anything at all.
  fn is_available(&self) -> bool { true }
}

impl<A: Analyzer + ?Sized> Analyzer for Box<A> {
  fn analyze(&self, word: &str) -> AnalyzerOutput { (**self).analyze(word) }

  fn is_available(&self) -> bool { (**self).is_available() }
}

/// Stand-in used when no analyzer is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableAnalyzer;

impl Analyzer for UnavailableAnalyzer {
  fn analyze(&self, _word: &str) -> AnalyzerOutput { AnalyzerOutput::unavailable() }

  fn is_available(&self) -> bool { false }
}
