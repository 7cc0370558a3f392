//! Root hypotheses and the canonical root form.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::arabic::root_letters;

/// Where a root hypothesis came from.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CandidateSource {
  /// The external morphological analyzer. Trusted without corroboration.
  #[strum(serialize = "external")]
  #[serde(rename = "external")]
  ExternalAnalyzer,
  /// Affix stripping over the lemma. Approximate by construction.
  #[strum(serialize = "pattern")]
  #[serde(rename = "pattern")]
  PatternHeuristic,
}

/// A root hypothesis for one entry. Lower `rank` is tried first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootCandidate {
  pub text:   String,
  pub source: CandidateSource,
  pub rank:   u8,
}

/// A root that passed validation, in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedRoot(String);

impl NormalizedRoot {
  /// Wrap an already-canonical root. Callers outside the validator use this
  /// only for roots read back from the store.
  pub fn new_unchecked(root: impl Into<String>) -> Self { Self(root.into()) }

  pub fn as_str(&self) -> &str { &self.0 }

  pub fn into_string(self) -> String { self.0 }

  pub fn letters(&self) -> Vec<char> { root_letters(&self.0) }
}

impl fmt::Display for NormalizedRoot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl AsRef<str> for NormalizedRoot {
  fn as_ref(&self) -> &str { &self.0 }
}
