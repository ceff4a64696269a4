//! Name keys for matching people across the planning and execution exports.
//!
//! A key is lowercase, accent-free (except å, ä and ö, which are separate
//! letters in Swedish), punctuation-free, and has its tokens sorted and
//! deduplicated, so "Andersson, Eva" and "eva ANDERSSON" share one key.

use std::collections::BTreeSet;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

const PRESERVED_LETTERS: [char; 3] = ['å', 'ä', 'ö'];

/// Canonical matching key for a raw person name.
///
/// Never fails: empty or symbol-only input gives an empty key.
pub fn name_key(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let cleaned: String = strip_accents(&lowered)
        .chars()
        .map(|c| if c == ',' || c == '-' { ' ' } else { c })
        .filter(|c| c.is_ascii_lowercase() || PRESERVED_LETTERS.contains(c) || c.is_whitespace())
        .collect();

    let tokens: BTreeSet<&str> = cleaned.split_whitespace().collect();
    tokens.into_iter().collect::<Vec<_>>().join(" ")
}

/// Drops combining marks after compatibility decomposition, leaving the
/// preserved letters whole. Input is composed first so a decomposed å still
/// counts as å.
fn strip_accents(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.nfc() {
        if PRESERVED_LETTERS.contains(&c) {
            out.push(c);
            continue;
        }
        out.extend(std::iter::once(c).nfkd().filter(|d| !is_combining_mark(*d)));
    }
    out
}

/// Report spelling of a name: separators become spaces and the tokens are
/// sorted, keeping the original case and accents.
pub fn display_form(raw: &str) -> String {
    let spaced: String = raw
        .chars()
        .map(|c| if c == ',' || c == '-' { ' ' } else { c })
        .collect();
    let mut tokens: Vec<&str> = spaced.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}
