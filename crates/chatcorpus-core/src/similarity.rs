//! Repeated-message ("repeater") detection with character n-gram Jaccard similarity.

use std::collections::HashSet;

pub const DEFAULT_NGRAM_SIZE: usize = 2;
pub const DEFAULT_REPEAT_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityScorer {
    ngram_size: usize,
    threshold: f64,
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self::new(DEFAULT_NGRAM_SIZE, DEFAULT_REPEAT_THRESHOLD)
    }
}

impl SimilarityScorer {
    pub fn new(ngram_size: usize, threshold: f64) -> Self {
        Self {
            ngram_size,
            threshold,
        }
    }

    /// Jaccard similarity of the two n-gram sets, or `None` when either text is
    /// too short to produce an n-gram.
    pub fn jaccard(&self, a: &str, b: &str) -> Option<f64> {
        let left = ngrams(a, self.ngram_size);
        let right = ngrams(b, self.ngram_size);
        if left.is_empty() || right.is_empty() {
            return None;
        }

        let intersection = left.intersection(&right).count();
        let union = left.union(&right).count();
        Some(intersection as f64 / union as f64)
    }

    /// True when `b` repeats `a`: identical non-empty text, or n-gram
    /// similarity above the threshold. Texts too short to judge are never
    /// repeats.
    pub fn is_repeater(&self, a: &str, b: &str) -> bool {
        if a == b {
            return !a.is_empty();
        }

        self.jaccard(a, b)
            .is_some_and(|similarity| similarity > self.threshold)
    }
}

/// Distinct contiguous substrings of `n` characters.
pub fn ngrams(text: &str, n: usize) -> HashSet<&str> {
    if n == 0 {
        return HashSet::new();
    }

    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(index, _)| index)
        .chain(std::iter::once(text.len()))
        .collect();
    if bounds.len() <= n {
        return HashSet::new();
    }

    bounds
        .windows(n + 1)
        .map(|window| &text[window[0]..window[n]])
        .collect()
}
