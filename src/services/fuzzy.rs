//! Fuzzy partial matching.

use unicode_segmentation::UnicodeSegmentation;

/// Best similarity (0-100) between the shorter string and any equally long
/// window of the longer one, compared case-insensitively.
///
/// Similarity is normalized Levenshtein over grapheme windows, so a keyword
/// that appears verbatim anywhere in the text scores 100.
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let (short, long) = if a.graphemes(true).count() <= b.graphemes(true).count() {
        (a, b)
    } else {
        (b, a)
    };

    let short_len = short.graphemes(true).count();
    if short_len == 0 {
        return 0;
    }
    if long.contains(short.as_str()) {
        return 100;
    }

    let long_graphemes: Vec<&str> = long.graphemes(true).collect();
    let mut best = 0.0_f64;
    for window in long_graphemes.windows(short_len) {
        let candidate = window.concat();
        let score = strsim::normalized_levenshtein(&short, &candidate);
        if score > best {
            best = score;
        }
    }

    (best * 100.0).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbatim_substring_is_perfect() {
        assert_eq!(partial_ratio("MDMA", "looking for clean mdma batches"), 100);
        assert_eq!(partial_ratio("looking for clean mdma batches", "MDMA"), 100);
    }

    #[test]
    fn empty_input_scores_zero() {
        assert_eq!(partial_ratio("", "anything"), 0);
        assert_eq!(partial_ratio("keyword", ""), 0);
    }

    #[test]
    fn one_typo_stays_above_default_threshold() {
        // "mdna" vs "mdma": one substitution over four characters
        assert_eq!(partial_ratio("mdma", "fresh mdna in stock"), 75);
    }

    #[test]
    fn unrelated_text_scores_low() {
        assert!(partial_ratio("cocaine", "weather is nice today") < 70);
    }

    #[test]
    fn equal_length_strings_compare_whole() {
        assert_eq!(partial_ratio("abcd", "abcx"), 75);
    }
}
