use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use ti_tokens::{
    ProbabilityNormalizer, SubwordMarker, TierThresholds, TokenRecordBuilder, WordGrouper,
    DEFAULT_MAX_ALTERNATIVES, DEFAULT_SUBWORD_MARKER,
};

use crate::error::{Result, SessionError};

/// Named threshold sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdPreset {
    Standard,
    Strict,
}

/// Either a preset name or explicit `{ high, medium }` bounds.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ThresholdSetting {
    Preset(ThresholdPreset),
    Custom(TierThresholds),
}

impl ThresholdSetting {
    pub fn thresholds(&self) -> TierThresholds {
        match self {
            ThresholdSetting::Preset(ThresholdPreset::Standard) => TierThresholds::STANDARD,
            ThresholdSetting::Preset(ThresholdPreset::Strict) => TierThresholds::STRICT,
            ThresholdSetting::Custom(t) => *t,
        }
    }
}

impl Default for ThresholdSetting {
    fn default() -> Self {
        ThresholdSetting::Preset(ThresholdPreset::Strict)
    }
}

/// Client configuration, usually read from a TOML file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Relay endpoint returning text and log-probabilities.
    pub relay_url: String,
    /// Second relay used only for log-probabilities. Setting it enables
    /// hybrid mode, where `relay_url` supplies the text.
    pub probe_relay_url: Option<String>,
    /// Initial sampling temperature, in `[0, 1]`.
    pub temperature: f32,
    /// Alternatives requested (and kept) per token.
    pub top_logprobs: u8,
    pub request_timeout_secs: u64,
    pub thresholds: ThresholdSetting,
    pub subword_marker: String,
    /// Whether a token with leading whitespace starts a new word.
    pub split_on_whitespace: bool,
    /// An alternative is "strong" when its probability exceeds this fraction
    /// of the chosen token's.
    pub strong_alternative_ratio: f64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: "http://localhost:3001/api/chat".to_string(),
            probe_relay_url: None,
            temperature: 0.3,
            top_logprobs: DEFAULT_MAX_ALTERNATIVES as u8,
            request_timeout_secs: 120,
            thresholds: ThresholdSetting::default(),
            subword_marker: DEFAULT_SUBWORD_MARKER.to_string(),
            split_on_whitespace: false,
            strong_alternative_ratio: 0.8,
        }
    }
}

impl ClientConfig {
    /// Read and validate a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| SessionError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ClientConfig =
            toml::from_str(content).map_err(|e| SessionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(SessionError::InvalidTemperature(self.temperature));
        }
        if !(0.0..=1.0).contains(&self.strong_alternative_ratio) {
            return Err(SessionError::Config(format!(
                "strong_alternative_ratio {} outside [0, 1]",
                self.strong_alternative_ratio
            )));
        }
        if self.top_logprobs > 20 {
            return Err(SessionError::Config(format!(
                "top_logprobs {} exceeds the upstream maximum of 20",
                self.top_logprobs
            )));
        }
        self.thresholds.thresholds().validate()?;
        Ok(())
    }

    pub fn is_hybrid(&self) -> bool {
        self.probe_relay_url.is_some()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn marker(&self) -> SubwordMarker {
        SubwordMarker::new(self.subword_marker.clone())
    }

    pub fn normalizer(&self) -> ProbabilityNormalizer {
        ProbabilityNormalizer::new(self.thresholds.thresholds())
    }

    pub fn record_builder(&self) -> TokenRecordBuilder {
        TokenRecordBuilder::new(self.normalizer()).with_max_alternatives(self.top_logprobs as usize)
    }

    pub fn grouper(&self) -> WordGrouper {
        WordGrouper::new(self.marker()).with_whitespace_split(self.split_on_whitespace)
    }
}
