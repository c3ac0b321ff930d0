//! Edit-distance based string similarity used as a matching fallback.

/// Similarity score assigned when one label contains the other.
pub const CONTAINMENT_SCORE: f64 = 0.9;

/// Fold a team label for comparison: lower-case, spaces and hyphens removed.
pub fn normalize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Similarity of two labels in `[0, 1]`.
///
/// - identical → `1.0`
/// - either empty → `0.0`
/// - one contains the other → [`CONTAINMENT_SCORE`]
/// - otherwise `1 - levenshtein / max_len`
///
/// Containment is checked in both directions, so the score is symmetric.
pub fn similarity(s1: &str, s2: &str) -> f64 {
    if s1 == s2 {
        return 1.0;
    }
    if s1.is_empty() || s2.is_empty() {
        return 0.0;
    }
    if s1.contains(s2) || s2.contains(s1) {
        return CONTAINMENT_SCORE;
    }

    let len1 = s1.chars().count();
    let len2 = s2.chars().count();
    let max_len = len1.max(len2);

    1.0 - levenshtein(s1, s2) as f64 / max_len as f64
}

/// Levenshtein edit distance with unit insert/delete/substitute costs,
/// counted in chars.
pub fn levenshtein(s1: &str, s2: &str) -> usize {
    let (short, long): (Vec<char>, Vec<char>) = {
        let a: Vec<char> = s1.chars().collect();
        let b: Vec<char> = s2.chars().collect();
        if a.len() <= b.len() { (a, b) } else { (b, a) }
    };

    if short.is_empty() {
        return long.len();
    }

    // Single DP row over the shorter string
    let mut row: Vec<usize> = (0..=short.len()).collect();
    for (i, long_char) in long.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, short_char) in short.iter().enumerate() {
            let substitute = diagonal + usize::from(short_char != long_char);
            let insert = row[j] + 1;
            let delete = row[j + 1] + 1;
            diagonal = row[j + 1];
            row[j + 1] = substitute.min(insert).min(delete);
        }
    }

    row[short.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_strings() {
        assert_eq!(similarity("celtics", "celtics"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(similarity("", "x"), 0.0);
        assert_eq!(similarity("x", ""), 0.0);
    }

    #[test]
    fn test_containment() {
        assert_eq!(similarity("lakers", "losangeleslakers"), CONTAINMENT_SCORE);
        assert_eq!(similarity("losangeleslakers", "lakers"), CONTAINMENT_SCORE);
    }

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("sitting", "kitten"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("flaw", "lawn"), 2);
    }

    #[test]
    fn test_edit_distance_similarity() {
        // distance 3 over max length 7
        let score = similarity("kitten", "sitting");
        assert!((score - (1.0 - 3.0 / 7.0)).abs() < 1e-12);
        assert_eq!(similarity("kitten", "sitting"), similarity("sitting", "kitten"));
    }

    #[test]
    fn test_unrelated_labels_score_low() {
        assert!(similarity("celtics", "nuggets") < 0.7);
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("Trail-Blazers"), "trailblazers");
        assert_eq!(normalize_label("Los Angeles Lakers"), "losangeleslakers");
    }
}
