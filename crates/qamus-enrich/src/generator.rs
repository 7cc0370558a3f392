//! Root hypotheses for a lemma.
//!
//! Two strategies: the root the external analyzer reported (cached on the
//! entry), and a lossy affix-stripping heuristic over the lemma itself. The
//! generator only proposes; the validator decides.

use qamus_core::{
  arabic::{is_weak, strip_diacritics},
  candidate::{CandidateSource, RootCandidate},
  entry::Entry,
};

/// Proclitics, tried in order; at most one is removed.
const PREFIXES: [&str; 12] = ["ال", "و", "ف", "ب", "ل", "ك", "أ", "إ", "م", "ت", "ي", "ن"];

/// Feminine, plural and dual endings and pronoun clitics; at most one is
/// removed.
const SUFFIXES: [&str; 12] = ["ة", "ات", "ان", "ون", "ين", "ها", "هم", "هن", "ه", "ك", "ت", "ى"];

const MIN_LETTERS: usize = 3;
const MAX_LETTERS: usize = 4;

#[derive(Debug, Clone)]
pub struct CandidateGenerator {
  strategies: Vec<CandidateSource>,
}

impl CandidateGenerator {
  /// `strategies` in order of trust; duplicates are ignored.
  pub fn new(strategies: &[CandidateSource]) -> Self {
    let mut ordered = Vec::with_capacity(strategies.len());
    for s in strategies {
      if !ordered.contains(s) {
        ordered.push(*s);
      }
    }
    Self { strategies: ordered }
  }

  pub fn strategies(&self) -> &[CandidateSource] { &self.strategies }

  /// Candidates for `entry`, best first. The rank of a candidate is the
  /// position of its strategy.
  pub fn generate(&self, entry: &Entry) -> Vec<RootCandidate> {
    self
      .strategies
      .iter()
      .enumerate()
      .filter_map(|(rank, source)| {
        let text = match source {
          CandidateSource::ExternalAnalyzer => {
            entry.analysis.as_ref()?.best_root()?.to_owned()
          }
          CandidateSource::PatternHeuristic => pattern_root(&entry.lemma)?,
        };
        Some(RootCandidate {
          text,
          source: *source,
          rank: u8::try_from(rank).unwrap_or(u8::MAX),
        })
      })
      .collect()
  }
}

/// Derive an approximate consonantal skeleton from `lemma`.
///
/// Strips vowel marks, one prefix and one suffix (each only if at least three
/// letters remain), drops internal weak letters while more than three letters
/// are left, and keeps at most four letters.
pub fn pattern_root(lemma: &str) -> Option<String> {
  let bare = strip_diacritics(lemma.trim());
  if bare.chars().count() < MIN_LETTERS {
    return None;
  }

  let mut stem = bare.as_str();
  if let Some(rest) = PREFIXES
    .iter()
    .find_map(|p| stem.strip_prefix(*p).filter(|r| long_enough(r)))
  {
    stem = rest;
  }
  if let Some(rest) = SUFFIXES
    .iter()
    .find_map(|s| stem.strip_suffix(*s).filter(|r| long_enough(r)))
  {
    stem = rest;
  }

  let mut letters: Vec<char> = stem.chars().collect();
  let mut i = 1;
  while letters.len() > MIN_LETTERS && i + 1 < letters.len() {
    if is_weak(letters[i]) {
      letters.remove(i);
    } else {
      i += 1;
    }
  }
  letters.truncate(MAX_LETTERS);

  (letters.len() >= MIN_LETTERS).then(|| letters.into_iter().collect())
}

fn long_enough(stem: &str) -> bool { stem.chars().count() >= MIN_LETTERS }
