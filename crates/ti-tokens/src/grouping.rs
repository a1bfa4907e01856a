use std::ops::Range;

use serde::Serialize;

use crate::marker::SubwordMarker;
use crate::normalizer::{ConfidenceTier, ProbabilityNormalizer};
use crate::record::TokenRecord;

/// Characters that always open a new group when a token starts with them.
pub const BOUNDARY_PUNCTUATION: [char; 6] = ['.', ',', '!', '?', ';', ':'];

/// A word: a contiguous span of token records plus its aggregate confidence.
///
/// Groups index into the record slice they were built from rather than owning
/// copies, so the records themselves are never touched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordGroup {
    /// First record index (inclusive).
    pub start: usize,
    /// Last record index (exclusive).
    pub end: usize,
    /// Member token texts with markers stripped, concatenated and trimmed.
    pub text: String,
    /// Unweighted arithmetic mean of member probabilities.
    pub average_probability: f64,
}

impl WordGroup {
    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Always false for groups produced by `WordGrouper`.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The member records of this group.
    ///
    /// `records` must be the slice this group was built from.
    pub fn tokens<'a>(&self, records: &'a [TokenRecord]) -> &'a [TokenRecord] {
        &records[self.span()]
    }

    /// Geometric mean of member probabilities, `exp(mean(ln p))`.
    ///
    /// Reported next to `average_probability`, which stays the primary figure.
    pub fn joint_probability(&self, records: &[TokenRecord]) -> f64 {
        let members = self.tokens(records);
        if members.is_empty() {
            return 0.0;
        }
        let mean_ln = members.iter().map(|r| r.probability.ln()).sum::<f64>() / members.len() as f64;
        mean_ln.exp()
    }

    pub fn tier(&self, normalizer: &ProbabilityNormalizer) -> ConfidenceTier {
        normalizer.classify(self.average_probability)
    }
}

/// Partitions a token record sequence into word groups.
///
/// A token opens a new group if it is the first token, starts with the
/// sub-word marker, starts with boundary punctuation, or (when enabled) starts
/// with whitespace. Every other token joins the open group.
#[derive(Debug, Clone)]
pub struct WordGrouper {
    marker: SubwordMarker,
    split_on_whitespace: bool,
}

impl WordGrouper {
    pub fn new(marker: SubwordMarker) -> Self {
        Self {
            marker,
            split_on_whitespace: false,
        }
    }

    /// Whether a leading whitespace character also opens a new group.
    pub fn with_whitespace_split(mut self, enabled: bool) -> Self {
        self.split_on_whitespace = enabled;
        self
    }

    pub fn marker(&self) -> &SubwordMarker {
        &self.marker
    }

    /// Returns true if `token` opens a new group regardless of position.
    pub fn starts_group(&self, token: &str) -> bool {
        if self.marker.starts_word(token) {
            return true;
        }
        match token.chars().next() {
            Some(c) if BOUNDARY_PUNCTUATION.contains(&c) => true,
            Some(c) if self.split_on_whitespace && c.is_whitespace() => true,
            _ => false,
        }
    }

    /// Group `records` into words. The result covers every index exactly once,
    /// in order.
    pub fn group(&self, records: &[TokenRecord]) -> Vec<WordGroup> {
        let mut groups = Vec::new();
        let mut start = 0;

        for (i, record) in records.iter().enumerate().skip(1) {
            if self.starts_group(&record.token) {
                groups.push(self.finalize(records, start..i));
                start = i;
            }
        }
        if start < records.len() {
            groups.push(self.finalize(records, start..records.len()));
        }

        groups
    }

    fn finalize(&self, records: &[TokenRecord], span: Range<usize>) -> WordGroup {
        let members = &records[span.clone()];
        let raw_text = members
            .iter()
            .map(|r| self.marker.strip(&r.token))
            .collect::<String>();
        let average_probability =
            members.iter().map(|r| r.probability).sum::<f64>() / members.len() as f64;

        WordGroup {
            start: span.start,
            end: span.end,
            text: raw_text.trim().to_string(),
            average_probability,
        }
    }
}

impl Default for WordGrouper {
    fn default() -> Self {
        Self::new(SubwordMarker::default())
    }
}
