//! Candidate selection for noisy catalogue results.
//!
//! Exact equality wins (first hit, stable in catalogue order); otherwise
//! the candidate at minimum edit distance, first-wins on ties. Comparison
//! lowercases and strips whitespace only; heavier normalisation makes
//! repeat scans pick different candidates for the same file.

use pes_scraper::Candidate;

/// Pick the best candidate for a query. Returns the index into
/// `candidates`, or `None` when the list is empty. Deterministic and
/// side-effect free.
pub fn best_match(query: &str, candidates: &[Candidate]) -> Option<usize> {
    if candidates.is_empty() {
        return None;
    }

    let wanted = normalise(query);

    if let Some(idx) = candidates
        .iter()
        .position(|c| normalise(&c.title) == wanted)
    {
        return Some(idx);
    }

    let mut best = 0;
    let mut best_distance = usize::MAX;
    for (idx, candidate) in candidates.iter().enumerate() {
        let distance = levenshtein(&wanted, &normalise(&candidate.title));
        if distance < best_distance {
            best = idx;
            best_distance = distance;
        }
    }
    Some(best)
}

/// Lowercase and drop all whitespace, for comparison only.
fn normalise(s: &str) -> String {
    s.to_lowercase().chars().filter(|c| !c.is_whitespace()).collect()
}

/// Classic two-row Levenshtein distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(prev[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut prev, &mut current);
    }

    prev[b.len()]
}
