// MIT License
// Copyright (c) 2024 Graham King

// Near-duplicate scoring. The batch report compares every pair in a sample,
// which is O(n²) and only reasonable for a few hundred articles. A corpus in
// the tens of thousands needs shingling plus locality-sensitive hashing, not
// a bigger sample.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+").expect("static regex"));

/// Set of lowercase word tokens
pub fn tokens(text: &str) -> HashSet<String> {
    let lower = text.to_lowercase();
    WORD.find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Jaccard index of the word sets of two texts, 0.0 when both are empty
pub fn jaccard(a: &str, b: &str) -> f64 {
    jaccard_sets(&tokens(a), &tokens(b))
}

pub fn jaccard_sets(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Cheaper signal for titles: shared words over the shorter title's words.
/// "Sleep Tips" vs "Sleep Tips for Toddlers" is 1.0.
pub fn title_overlap(a: &str, b: &str) -> f64 {
    let (a, b) = (tokens(a), tokens(b));
    let smaller = a.len().min(b.len());
    if smaller == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / smaller as f64
}
