use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ti_tokens::{reconstruct_text, RawAlternatives, SubwordMarker, TokenRecord, TokenRecordBuilder};

use crate::error::{IngestError, Result};

/// A relay response body, before normalization.
///
/// Either the relay's `{error}` body or a list of choices. Each choice is one
/// of the two upstream shapes. Nothing past `into_parsed` looks at the shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CompletionPayload {
    Failure(ErrorBody),
    Success(SuccessBody),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// The relay reports a plain string; the upstream API nests an object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Message(String),
    Object { message: String },
}

impl ErrorDetail {
    pub fn message(&self) -> &str {
        match self {
            ErrorDetail::Message(m) => m,
            ErrorDetail::Object { message } => message,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuccessBody {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Choice {
    Chat(ChatChoice),
    Legacy(LegacyChoice),
}

/// Chat-completions choice: `message.content` plus `logprobs.content[]`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
    #[serde(default)]
    pub logprobs: Option<ChatLogprobs>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatLogprobs {
    #[serde(default)]
    pub content: Option<Vec<ChatTokenLogprob>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatTokenLogprob {
    pub token: String,
    pub logprob: Option<f64>,
    #[serde(default)]
    pub top_logprobs: Vec<TopLogprob>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopLogprob {
    pub token: String,
    pub logprob: f64,
}

/// Legacy completions choice: `text` plus parallel `logprobs` arrays.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyChoice {
    pub text: String,
    #[serde(default)]
    pub logprobs: Option<LegacyLogprobs>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegacyLogprobs {
    pub tokens: Vec<String>,
    pub token_logprobs: Vec<Option<f64>>,
    /// One map of alternative token to log-probability per position, in the
    /// order the source listed them.
    #[serde(default)]
    pub top_logprobs: Option<Vec<Option<IndexMap<String, f64>>>>,
}

/// A normalized response: text plus token records when the source sent them.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCompletion {
    pub text: String,
    pub tokens: Option<Vec<TokenRecord>>,
}

/// The final, canonical result handed to the session: display text and the
/// token records that back it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Completion {
    pub content: String,
    pub tokens: Vec<TokenRecord>,
}

impl CompletionPayload {
    pub fn from_json(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(body)?)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Normalize the first choice into a `ParsedCompletion`.
    ///
    /// # Errors
    /// - `Upstream` for an `{error}` body.
    /// - `MalformedResponse` when there are no choices or the legacy arrays
    ///   disagree in length.
    /// - `Token(InvalidProbability)` for a missing or NaN log-probability.
    pub fn into_parsed(self, builder: &TokenRecordBuilder) -> Result<ParsedCompletion> {
        let body = match self {
            CompletionPayload::Failure(e) => {
                return Err(IngestError::Upstream(e.error.message().to_string()))
            }
            CompletionPayload::Success(body) => body,
        };

        let choice = body.choices.into_iter().next().ok_or_else(|| {
            IngestError::MalformedResponse("response contains no choices".to_string())
        })?;

        let parsed = match choice {
            Choice::Chat(chat) => parse_chat(chat, builder)?,
            Choice::Legacy(legacy) => parse_legacy(legacy, builder)?,
        };

        debug!(
            text_len = parsed.text.len(),
            tokens = parsed.tokens.as_ref().map(Vec::len),
            "parsed completion payload"
        );
        Ok(parsed)
    }
}

impl ParsedCompletion {
    /// Parse a relay body straight into a `ParsedCompletion`.
    pub fn from_json(body: &str, builder: &TokenRecordBuilder) -> Result<Self> {
        CompletionPayload::from_json(body)?.into_parsed(builder)
    }

    /// Require token data and produce the canonical `Completion`.
    ///
    /// An empty text is rebuilt from the tokens.
    ///
    /// # Errors
    /// Returns `MalformedResponse` if the response carried no log-probabilities
    /// or an empty token list.
    pub fn into_completion(self, marker: &SubwordMarker) -> Result<Completion> {
        let tokens = self.tokens.ok_or_else(|| {
            IngestError::MalformedResponse("response carries no logprobs".to_string())
        })?;
        if tokens.is_empty() {
            return Err(IngestError::MalformedResponse(
                "response carries an empty logprobs list".to_string(),
            ));
        }
        let content = if self.text.is_empty() {
            reconstruct_text(&tokens, marker)
        } else {
            self.text
        };
        Ok(Completion { content, tokens })
    }
}

fn parse_chat(chat: ChatChoice, builder: &TokenRecordBuilder) -> Result<ParsedCompletion> {
    let entries = chat.logprobs.and_then(|l| l.content);
    let tokens = match entries {
        None => None,
        Some(entries) => {
            let mut tokens = Vec::with_capacity(entries.len());
            let mut logprobs = Vec::with_capacity(entries.len());
            let mut alternatives: Vec<RawAlternatives> = Vec::with_capacity(entries.len());
            for entry in entries {
                tokens.push(entry.token);
                logprobs.push(entry.logprob.unwrap_or(f64::NAN));
                alternatives.push(
                    entry
                        .top_logprobs
                        .into_iter()
                        .map(|top| (top.token, top.logprob))
                        .collect(),
                );
            }
            Some(builder.build(&tokens[..], &logprobs, Some(&alternatives[..]))?)
        }
    };

    Ok(ParsedCompletion {
        text: chat.message.content.unwrap_or_default(),
        tokens,
    })
}

fn parse_legacy(legacy: LegacyChoice, builder: &TokenRecordBuilder) -> Result<ParsedCompletion> {
    let tokens = match legacy.logprobs {
        None => None,
        Some(lp) => {
            let logprobs: Vec<f64> = lp
                .token_logprobs
                .iter()
                .map(|v| v.unwrap_or(f64::NAN))
                .collect();
            let alternatives: Option<Vec<RawAlternatives>> = lp.top_logprobs.map(|tops| {
                tops.into_iter()
                    .map(|top| top.map(|m| m.into_iter().collect()).unwrap_or_default())
                    .collect()
            });
            Some(builder.build(&lp.tokens[..], &logprobs, alternatives.as_deref())?)
        }
    };

    Ok(ParsedCompletion {
        text: legacy.text,
        tokens,
    })
}
