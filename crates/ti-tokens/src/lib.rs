//! `ti-tokens` - Token probability primitives for token-insight.
//!
//! This crate provides:
//! - A `ProbabilityNormalizer` that turns log-probabilities into probabilities
//!   and sorts them into confidence tiers
//! - The canonical `TokenRecord` type and its `TokenRecordBuilder`
//! - Sub-word marker handling for display text
//! - A `WordGrouper` that partitions token records into word spans

pub mod builder;
pub mod error;
pub mod grouping;
pub mod marker;
pub mod normalizer;
pub mod record;

// Re-export primary types at the crate root for convenience.
pub use builder::{RawAlternatives, TokenRecordBuilder, DEFAULT_MAX_ALTERNATIVES};
pub use error::{Result, TokenError};
pub use grouping::{WordGroup, WordGrouper, BOUNDARY_PUNCTUATION};
pub use marker::{SubwordMarker, DEFAULT_SUBWORD_MARKER};
pub use normalizer::{ConfidenceTier, ProbabilityNormalizer, TierThresholds};
pub use record::{reconstruct_text, Alternative, TokenRecord};
