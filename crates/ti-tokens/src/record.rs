use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::marker::SubwordMarker;

/// A candidate token the model considered at a step, with its probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    pub token: String,
    pub probability: f64,
}

/// One emitted token paired with its probability and ranked alternatives.
///
/// `probability` always comes from exponentiating a log-probability; raw log
/// values never leave the builder. `alternatives` is sorted by descending
/// probability and is empty (never absent) when the source gave none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub token: String,
    pub probability: f64,
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
}

impl TokenRecord {
    /// Token text for display, with sub-word markers turned into spaces.
    pub fn display_text<'a>(&'a self, marker: &SubwordMarker) -> Cow<'a, str> {
        marker.display(&self.token)
    }

    /// True if any other candidate is at least nearly as likely as the chosen
    /// token.
    ///
    /// "Nearly" means the alternative's probability exceeds `ratio` times the
    /// chosen probability. The chosen token's own entry in `alternatives` is
    /// not counted.
    pub fn has_strong_alternative(&self, ratio: f64) -> bool {
        let bar = self.probability * ratio;
        self.alternatives
            .iter()
            .filter(|alt| alt.token != self.token)
            .any(|alt| alt.probability > bar)
    }

    /// The chosen token followed by its alternatives, sorted by descending
    /// probability. The boolean marks the chosen entry.
    ///
    /// Alternatives usually include the chosen token itself; it is listed
    /// once either way.
    pub fn ranked_candidates(&self) -> Vec<(Alternative, bool)> {
        let mut candidates: Vec<(Alternative, bool)> = Vec::with_capacity(self.alternatives.len() + 1);
        candidates.push((
            Alternative {
                token: self.token.clone(),
                probability: self.probability,
            },
            true,
        ));
        candidates.extend(
            self.alternatives
                .iter()
                .filter(|alt| alt.token != self.token)
                .map(|alt| (alt.clone(), false)),
        );

        candidates.sort_by(|a, b| b.0.probability.total_cmp(&a.0.probability));
        candidates
    }
}

/// Rebuild readable text from a token sequence.
pub fn reconstruct_text(records: &[TokenRecord], marker: &SubwordMarker) -> String {
    records
        .iter()
        .map(|r| r.display_text(marker))
        .collect::<String>()
}
