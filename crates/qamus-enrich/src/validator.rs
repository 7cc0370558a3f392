//! Candidate validation against the corpus of known roots.

use std::{
  collections::{HashMap, HashSet, VecDeque},
  fmt,
};

use qamus_core::{
  arabic::{is_consonant, is_root_separator, root_letters},
  candidate::{CandidateSource, NormalizedRoot, RootCandidate},
  store::KnownRoot,
};

/// Characters left behind by JSON and list formatting around a root.
const ARTIFACTS: [char; 6] = ['[', ']', '"', '\'', '(', ')'];

const MIN_CHARS: usize = 3;

/// Longest candidate whose letter subsequences are tried against the corpus.
const MAX_SNAP_LETTERS: usize = 6;

// ─── Rejections ──────────────────────────────────────────────────────────────

/// Why a candidate was not accepted. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
  Empty,
  TooShort,
  /// Contains characters that are neither letters nor root separators.
  Malformed,
  /// A heuristic candidate with no support from the corpus.
  Uncorroborated,
}

impl Rejection {
  pub fn is_malformed(self) -> bool { matches!(self, Rejection::Malformed) }
}

impl fmt::Display for Rejection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Rejection::Empty => "empty",
      Rejection::TooShort => "too short",
      Rejection::Malformed => "malformed",
      Rejection::Uncorroborated => "uncorroborated",
    })
  }
}

// ─── Corpus ──────────────────────────────────────────────────────────────────

/// The roots an entry's candidates are checked against: imported roots, plus
/// roots given to entries earlier in id order, whether in this run or before.
///
/// Acceptance of heuristic candidates depends on what is in here, so results
/// depend on processing order. Because the order is always ascending id, a
/// later run sees the same corpus for an entry as the run that deferred it.
#[derive(Debug, Clone, Default)]
pub struct RootCorpus {
  roots:      HashSet<String>,
  /// Letter skeleton of each root, for snapping.
  by_letters: HashMap<String, String>,
  /// Every unordered pair of distinct letters occurring together in a root.
  pairs:      HashSet<(char, char)>,
}

impl RootCorpus {
  pub fn new() -> Self { Self::default() }

  pub fn from_roots<I, R>(roots: I) -> Self
  where
    I: IntoIterator<Item = R>,
    R: AsRef<str>,
  {
    let mut corpus = Self::new();
    for root in roots {
      corpus.insert(root.as_ref());
    }
    corpus
  }

  /// Seed a corpus from stored roots. Imported roots are usable at once;
  /// enriched ones are held until [`RootCorpus::release`] passes the first
  /// entry that holds them.
  pub fn seed(known: Vec<KnownRoot>) -> (Self, HeldRoots) {
    let (imported, mut enriched): (Vec<_>, Vec<_>) =
      known.into_iter().partition(|k| k.source.is_none());
    enriched.sort_by_key(|k| k.first_id);
    (Self::from_roots(imported.iter().map(|k| &k.root)), HeldRoots(enriched.into()))
  }

  /// Move every held root visible to entry `id` into the corpus.
  pub fn release(&mut self, held: &mut HeldRoots, id: i64) {
    while held.0.front().is_some_and(|k| k.visible_to(id)) {
      if let Some(known) = held.0.pop_front() {
        self.insert(&known.root);
      }
    }
  }

  /// Add a root. Returns `false` if it was already known or is blank.
  pub fn insert(&mut self, root: &str) -> bool {
    let root = root.trim();
    if root.is_empty() || !self.roots.insert(root.to_owned()) {
      return false;
    }

    let mut letters = root_letters(root);
    if letters.len() >= MIN_CHARS {
      self
        .by_letters
        .entry(letters.iter().collect())
        .or_insert_with(|| root.to_owned());
    }

    letters.sort_unstable();
    letters.dedup();
    for (i, a) in letters.iter().enumerate() {
      for b in &letters[i + 1..] {
        self.pairs.insert((*a, *b));
      }
    }
    true
  }

  pub fn contains(&self, root: &str) -> bool { self.roots.contains(root.trim()) }

  pub fn len(&self) -> usize { self.roots.len() }

  pub fn is_empty(&self) -> bool { self.roots.is_empty() }

  /// Whether some single root contains at least two distinct letters of
  /// `letters`.
  pub fn corroborates(&self, letters: &[char]) -> bool {
    let mut distinct = letters.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    distinct
      .iter()
      .enumerate()
      .any(|(i, a)| distinct[i + 1..].iter().any(|b| self.pairs.contains(&(*a, *b))))
  }

  /// The longest corpus root (at least three letters) whose letters appear in
  /// order within `letters`.
  pub fn snap(&self, letters: &[char]) -> Option<&str> {
    if letters.len() < MIN_CHARS || letters.len() > MAX_SNAP_LETTERS {
      return None;
    }
    (MIN_CHARS..=letters.len())
      .rev()
      .find_map(|len| {
        subsequences(letters, len)
          .into_iter()
          .find_map(|key| self.by_letters.get(&key))
      })
      .map(String::as_str)
  }
}

/// All order-preserving subsequences of `letters` of length `len`.
fn subsequences(letters: &[char], len: usize) -> Vec<String> {
  fn walk(letters: &[char], len: usize, start: usize, current: &mut String, out: &mut Vec<String>) {
    if current.chars().count() == len {
      out.push(current.clone());
      return;
    }
    for i in start..letters.len() {
      current.push(letters[i]);
      walk(letters, len, i + 1, current, out);
      current.pop();
    }
  }

  let mut out = vec![];
  walk(letters, len, 0, &mut String::new(), &mut out);
  out
}

/// Enriched roots not yet visible to the entries being planned, ordered by
/// their first holder.
#[derive(Debug, Default)]
pub struct HeldRoots(VecDeque<KnownRoot>);

impl HeldRoots {
  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

// ─── Normalisation ───────────────────────────────────────────────────────────

/// Clean a candidate and bring it to canonical form.
///
/// Formatting artifacts are removed. Exactly three consonants with no
/// separator become space-separated; anything else that already contains a
/// separator, or is longer, is kept as written.
pub fn normalize(text: &str) -> Result<String, Rejection> {
  let cleaned: String = text.chars().filter(|c| !ARTIFACTS.contains(c)).collect();
  let cleaned = cleaned.trim();

  if cleaned.is_empty() {
    return Err(Rejection::Empty);
  }
  if cleaned.chars().count() < MIN_CHARS {
    return Err(Rejection::TooShort);
  }
  if !cleaned.chars().all(|c| c.is_alphabetic() || is_root_separator(c)) {
    return Err(Rejection::Malformed);
  }
  if cleaned.chars().any(is_root_separator) {
    return Ok(cleaned.to_owned());
  }

  let letters: Vec<char> = cleaned.chars().collect();
  if letters.len() == 3 && letters.iter().all(|c| is_consonant(*c)) {
    return Ok(
      letters
        .iter()
        .map(char::to_string)
        .collect::<Vec<_>>()
        .join(" "),
    );
  }
  Ok(cleaned.to_owned())
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Accept or reject one candidate.
///
/// External-analyzer candidates are accepted once they normalise. Heuristic
/// candidates snap to a corpus root they spell out, or are accepted as
/// written when they share two letters with a corpus root or consist only of
/// consonants.
pub fn validate(candidate: &RootCandidate, corpus: &RootCorpus) -> Result<NormalizedRoot, Rejection> {
  let normalized = normalize(&candidate.text)?;

  match candidate.source {
    CandidateSource::ExternalAnalyzer => Ok(NormalizedRoot::new_unchecked(normalized)),
    CandidateSource::PatternHeuristic => {
      let letters = root_letters(&normalized);

      if let Some(root) = corpus.snap(&letters) {
        return Ok(NormalizedRoot::new_unchecked(root));
      }
      if corpus.corroborates(&letters) || letters.iter().all(|c| is_consonant(*c)) {
        return Ok(NormalizedRoot::new_unchecked(normalized));
      }
      Err(Rejection::Uncorroborated)
    }
  }
}
