//! Arabic script helpers shared by the store and the enrichment pipeline.

use unicode_normalization::UnicodeNormalization as _;

/// Letters a root may be spelled with: the 28 consonants plus hamza and its
/// alef seats.
pub const CONSONANTS: &str = "ابتثجحخدذرزسشصضطظعغفقكلمنهويءآأإ";

/// The semivowel letters elided or altered during derivation.
pub const WEAK_LETTERS: [char; 3] = ['و', 'ي', 'ا'];

/// Characters that already separate the letters of a formatted root
/// (`ك ت ب`, `ك.ت.ب`, `ق.#.ل`).
pub const ROOT_SEPARATORS: [char; 3] = [' ', '.', '#'];

const TATWEEL: char = '\u{0640}';

pub fn is_consonant(c: char) -> bool { CONSONANTS.contains(c) }

pub fn is_weak(c: char) -> bool { WEAK_LETTERS.contains(&c) }

pub fn is_root_separator(c: char) -> bool { ROOT_SEPARATORS.contains(&c) }

/// Tanwin, short vowels, shadda, sukun and the dagger alef.
pub fn is_diacritic(c: char) -> bool {
  ('\u{064B}'..='\u{0652}').contains(&c) || c == '\u{0670}'
}

/// Every combining mark the search normaliser removes. Wider than
/// [`is_diacritic`]: also Quranic annotation signs and small high letters.
fn is_extended_mark(c: char) -> bool {
  ('\u{0610}'..='\u{061A}').contains(&c)
    || ('\u{064B}'..='\u{065F}').contains(&c)
    || c == '\u{0670}'
    || ('\u{06D6}'..='\u{06ED}').contains(&c)
}

/// Remove the fixed set of vowel marks, leaving the letter skeleton.
pub fn strip_diacritics(text: &str) -> String {
  text.chars().filter(|c| !is_diacritic(*c)).collect()
}

/// Letters of a formatted root with separators and placeholders removed.
pub fn root_letters(root: &str) -> Vec<char> {
  root
    .chars()
    .filter(|c| !is_root_separator(*c) && !c.is_whitespace())
    .collect()
}

/// Aggressive normalisation used for the `lemma_norm` search key.
///
/// Removes marks and tatweel, folds alef/hamza variants to bare alef and alef
/// maksura to yeh, composes to NFC and collapses whitespace.
pub fn normalize_search_key(text: &str) -> String {
  let folded: String = text
    .chars()
    .filter(|c| !is_extended_mark(*c) && *c != TATWEEL)
    .map(|c| match c {
      'آ' | 'أ' | 'إ' | 'ٱ' => 'ا',
      'ى' => 'ي',
      other => other,
    })
    .nfc()
    .collect();

  folded.split_whitespace().collect::<Vec<_>>().join(" ")
}
