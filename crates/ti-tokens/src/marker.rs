use std::borrow::Cow;

/// Marker byte-level BPE tokenizers use to encode a leading space.
pub const DEFAULT_SUBWORD_MARKER: &str = "\u{0120}";

/// The sub-word-boundary marker a tokenizer embeds in token text.
///
/// A token that starts with the marker begins a new word. The marker is only
/// ever removed from display text; raw token strings are left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubwordMarker {
    marker: String,
}

impl SubwordMarker {
    /// Create a marker from its textual form (e.g. `"Ġ"` or `"▁"`).
    ///
    /// An empty marker disables marker detection.
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.marker
    }

    /// Returns true if `token` begins with the marker.
    pub fn starts_word(&self, token: &str) -> bool {
        !self.marker.is_empty() && token.starts_with(&self.marker)
    }

    /// Token text with every marker removed.
    pub fn strip<'a>(&self, token: &'a str) -> Cow<'a, str> {
        if self.marker.is_empty() || !token.contains(&self.marker) {
            Cow::Borrowed(token)
        } else {
            Cow::Owned(token.replace(&self.marker, ""))
        }
    }

    /// Token text as it should read on screen: each marker becomes a space.
    pub fn display<'a>(&self, token: &'a str) -> Cow<'a, str> {
        if self.marker.is_empty() || !token.contains(&self.marker) {
            Cow::Borrowed(token)
        } else {
            Cow::Owned(token.replace(&self.marker, " "))
        }
    }
}

impl Default for SubwordMarker {
    fn default() -> Self {
        Self::new(DEFAULT_SUBWORD_MARKER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_marker() {
        let m = SubwordMarker::default();
        assert_eq!(m.as_str(), "Ġ");
        assert!(m.starts_word("Ġcat"));
        assert!(!m.starts_word("cat"));
        assert!(!m.starts_word(""));
    }

    #[test]
    fn test_strip_and_display() {
        let m = SubwordMarker::default();
        assert_eq!(m.strip("Ġcat"), "cat");
        assert_eq!(m.display("Ġcat"), " cat");
        assert_eq!(m.display("ĠĠx"), "  x");
        assert!(matches!(m.strip("plain"), Cow::Borrowed("plain")));
    }

    #[test]
    fn test_sentencepiece_marker() {
        let m = SubwordMarker::new("▁");
        assert!(m.starts_word("▁the"));
        assert_eq!(m.display("▁the"), " the");
    }

    #[test]
    fn test_empty_marker_disabled() {
        let m = SubwordMarker::new("");
        assert!(!m.starts_word("Ġcat"));
        assert_eq!(m.strip("Ġcat"), "Ġcat");
    }
}
