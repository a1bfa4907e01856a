use crate::error::{Result, TokenError};
use crate::normalizer::ProbabilityNormalizer;
use crate::record::{Alternative, TokenRecord};

/// Alternative tokens reported at one position, as `(token, logprob)` pairs.
pub type RawAlternatives = Vec<(String, f64)>;

/// Number of alternatives kept per token unless configured otherwise.
pub const DEFAULT_MAX_ALTERNATIVES: usize = 5;

/// Builds `TokenRecord`s from parallel token / log-probability sequences.
#[derive(Debug, Clone)]
pub struct TokenRecordBuilder {
    normalizer: ProbabilityNormalizer,
    max_alternatives: usize,
}

impl TokenRecordBuilder {
    /// Create a builder that keeps up to `DEFAULT_MAX_ALTERNATIVES` per token.
    pub fn new(normalizer: ProbabilityNormalizer) -> Self {
        Self {
            normalizer,
            max_alternatives: DEFAULT_MAX_ALTERNATIVES,
        }
    }

    /// Set the maximum number of alternatives kept per token.
    pub fn with_max_alternatives(mut self, max_alternatives: usize) -> Self {
        self.max_alternatives = max_alternatives;
        self
    }

    pub fn normalizer(&self) -> &ProbabilityNormalizer {
        &self.normalizer
    }

    /// Pair each token with its probability and ranked alternatives.
    ///
    /// `alternatives`, when given, must have one entry per token; an empty
    /// entry yields an empty `alternatives` list on the record.
    ///
    /// # Errors
    /// - `MalformedResponse` if the sequences differ in length.
    /// - `InvalidProbability` if any log-probability is NaN.
    pub fn build<S: AsRef<str>>(
        &self,
        tokens: &[S],
        logprobs: &[f64],
        alternatives: Option<&[RawAlternatives]>,
    ) -> Result<Vec<TokenRecord>> {
        if tokens.len() != logprobs.len() {
            return Err(TokenError::MalformedResponse(format!(
                "tokens length ({}) does not match logprobs length ({})",
                tokens.len(),
                logprobs.len()
            )));
        }
        if let Some(alts) = alternatives {
            if alts.len() != tokens.len() {
                return Err(TokenError::MalformedResponse(format!(
                    "tokens length ({}) does not match alternatives length ({})",
                    tokens.len(),
                    alts.len()
                )));
            }
        }

        let mut records = Vec::with_capacity(tokens.len());
        for (i, (token, &logprob)) in tokens.iter().zip(logprobs).enumerate() {
            let probability = self.normalizer.normalize(logprob)?;
            let ranked = match alternatives {
                Some(alts) => self.rank_alternatives(&alts[i])?,
                None => Vec::new(),
            };
            records.push(TokenRecord {
                token: token.as_ref().to_string(),
                probability,
                alternatives: ranked,
            });
        }

        Ok(records)
    }

    /// Exponentiate, sort descending (stable), and truncate one position's
    /// alternatives.
    fn rank_alternatives(&self, raw: &[(String, f64)]) -> Result<Vec<Alternative>> {
        let mut ranked = raw
            .iter()
            .map(|(token, logprob)| {
                Ok(Alternative {
                    token: token.clone(),
                    probability: self.normalizer.normalize(*logprob)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        ranked.sort_by(|a, b| b.probability.total_cmp(&a.probability));
        ranked.truncate(self.max_alternatives);
        Ok(ranked)
    }
}

impl Default for TokenRecordBuilder {
    fn default() -> Self {
        Self::new(ProbabilityNormalizer::default())
    }
}
