//! Topic pattern matching and specificity scoring.
//!
//! A pattern is an exact topic, the catch-all `"#"`, or a prefix ending
//! in `"/*"` that matches exactly one additional segment level.

/// Returns true if `pattern` matches `topic`.
pub fn matches(pattern: &str, topic: &str) -> bool {
    if pattern == "#" {
        return true;
    }

    if let Some(prefix) = pattern.strip_suffix("/*") {
        let prefix_segments: Vec<&str> = prefix.split('/').collect();
        let topic_segments: Vec<&str> = topic.split('/').collect();

        // One additional level, no more, no fewer.
        if topic_segments.len() != prefix_segments.len() + 1 {
            return false;
        }
        return prefix_segments
            .iter()
            .zip(topic_segments.iter())
            .all(|(p, t)| p == t);
    }

    pattern == topic
}

/// Specificity score for a pattern: exact segments are rewarded, wildcard
/// characters penalized, and segment count breaks ties between patterns
/// with the same exact/wildcard mix. Floored at zero.
pub fn specificity(pattern: &str) -> f64 {
    if pattern == "#" {
        return 0.0;
    }

    let segments: Vec<&str> = pattern.split('/').collect();
    let exact = segments
        .iter()
        .filter(|s| !s.contains('*') && !s.contains('+'))
        .count() as f64;
    let wildcards = pattern.chars().filter(|c| *c == '*' || *c == '+').count() as f64;

    (exact * 10.0 - wildcards * 5.0 + segments.len() as f64).max(0.0)
}
