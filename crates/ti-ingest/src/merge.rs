use tracing::debug;

use ti_tokens::{reconstruct_text, SubwordMarker};

use crate::error::{IngestError, Result};
use crate::payload::{Completion, ParsedCompletion};

/// Joins canonical text from one completion with the token probabilities of
/// another.
///
/// Some sources give good answers but no log-probabilities; a second, cheaper
/// source called with the same conversation supplies them. The probe's
/// tokens are used as they are. They are not re-aligned against the text.
#[derive(Debug, Clone, Default)]
pub struct CompletionMerger {
    marker: SubwordMarker,
}

impl CompletionMerger {
    pub fn new(marker: SubwordMarker) -> Self {
        Self { marker }
    }

    /// Build a `Completion` whose content is `text.text` and whose tokens are
    /// `probe.tokens`.
    ///
    /// # Errors
    /// Returns `MergeMismatch` if the probe has no tokens. No placeholder
    /// probabilities are ever substituted.
    pub fn merge(&self, text: ParsedCompletion, probe: ParsedCompletion) -> Result<Completion> {
        let tokens = match probe.tokens {
            Some(tokens) if !tokens.is_empty() => tokens,
            _ => {
                return Err(IngestError::MergeMismatch(
                    "probability source returned no tokens".to_string(),
                ))
            }
        };

        let content = if text.text.is_empty() {
            probe.text
        } else {
            text.text
        };

        let probe_text = reconstruct_text(&tokens, &self.marker);
        if probe_text.trim() != content.trim() {
            debug!(
                content_len = content.len(),
                probe_len = probe_text.len(),
                tokens = tokens.len(),
                "merged text differs from probability source"
            );
        }

        Ok(Completion { content, tokens })
    }
}
