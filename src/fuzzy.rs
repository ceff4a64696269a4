//! Multi-strategy fuzzy name similarity on a 0-100 scale.
//!
//! Four views of the same pair are scored with normalized Levenshtein
//! similarity and the best one wins:
//! - ratio: whole strings
//! - partial: best window of the longer string against the shorter one
//! - token sort: tokens sorted before comparing
//! - token set: shared tokens compared against each side's remainder

use std::collections::BTreeSet;

use strsim::normalized_levenshtein;

/// Similarity of two names, 0 (unrelated) to 100 (identical).
pub fn score(a: &str, b: &str) -> u8 {
    let a = a.trim();
    let b = b.trim();
    if a.is_empty() || b.is_empty() {
        return if a == b { 100 } else { 0 };
    }

    let best = ratio(a, b)
        .max(partial_ratio(a, b))
        .max(token_sort_ratio(a, b))
        .max(token_set_ratio(a, b));

    (best * 100.0).round().clamp(0.0, 100.0) as u8
}

fn ratio(a: &str, b: &str) -> f64 {
    normalized_levenshtein(a, b)
}

fn partial_ratio(a: &str, b: &str) -> f64 {
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    let long_chars: Vec<char> = long.chars().collect();
    let width = short.chars().count();
    if width == long_chars.len() {
        return ratio(short, long);
    }

    let mut best = 0.0_f64;
    for window in long_chars.windows(width) {
        let candidate: String = window.iter().collect();
        best = best.max(ratio(short, &candidate));
        if best >= 1.0 {
            break;
        }
    }
    best
}

fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn token_set_ratio(a: &str, b: &str) -> f64 {
    let left: BTreeSet<&str> = a.split_whitespace().collect();
    let right: BTreeSet<&str> = b.split_whitespace().collect();

    let shared: Vec<&str> = left.intersection(&right).copied().collect();
    let only_left: Vec<&str> = left.difference(&right).copied().collect();
    let only_right: Vec<&str> = right.difference(&left).copied().collect();

    // One side's tokens are a subset of the other's.
    if !shared.is_empty() && (only_left.is_empty() || only_right.is_empty()) {
        return 1.0;
    }

    let shared = shared.join(" ");
    let with_left = join_nonempty(&shared, &only_left.join(" "));
    let with_right = join_nonempty(&shared, &only_right.join(" "));

    let mut best = ratio(&with_left, &with_right);
    if !shared.is_empty() {
        best = best
            .max(ratio(&shared, &with_left))
            .max(ratio(&shared, &with_right));
    }
    best
}

fn sorted_tokens(text: &str) -> String {
    let mut tokens: Vec<&str> = text.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn join_nonempty(head: &str, tail: &str) -> String {
    match (head.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (_, true) => head.to_string(),
        _ => format!("{head} {tail}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_score_full() {
        assert_eq!(score("andersson eva", "andersson eva"), 100);
        assert_eq!(score("", ""), 100);
    }

    #[test]
    fn empty_against_anything_scores_zero() {
        assert_eq!(score("", "eva"), 0);
        assert_eq!(score("nilsson per", "   "), 0);
    }

    #[test]
    fn word_order_is_ignored() {
        assert_eq!(score("Per Nilsson", "Nilsson Per"), 100);
    }

    #[test]
    fn contained_name_scores_full_through_partial_window() {
        assert_eq!(score("eva", "andersson eva"), 100);
    }

    #[test]
    fn token_subset_scores_full() {
        assert_eq!(score("eva andersson", "eva maria andersson"), 100);
    }

    #[test]
    fn misspelled_surname_stays_above_base_threshold() {
        let value = score("Andersson, Eva", "Eva Anderson");
        assert!(value >= 60, "score was {value}");
    }

    #[test]
    fn abbreviated_name_falls_below_base_threshold() {
        let value = score("Andersson, Eva", "Eva A.");
        assert!(value < 60, "score was {value}");
    }

    #[test]
    fn unrelated_names_score_low() {
        let value = score("nilsson per", "karlsson ulla");
        assert!(value < 60, "score was {value}");
    }

    #[test]
    fn score_is_symmetric() {
        for (a, b) in [
            ("Andersson, Eva", "Eva A."),
            ("nilsson per", "nilson per"),
            ("eva", "andersson eva"),
        ] {
            assert_eq!(score(a, b), score(b, a));
        }
    }
}
