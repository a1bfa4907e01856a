use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use ti_ingest::{ErrorBody, ParsedCompletion};
use ti_tokens::TokenRecordBuilder;

use crate::conversation::ApiMessage;
use crate::error::{Result, SessionError};
use crate::source::Relay;

/// Body POSTed to the relay.
///
/// The relay owns model choice and credentials; the client only sends the
/// conversation, the temperature, and whether it wants log-probabilities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayRequest {
    pub messages: Vec<ApiMessage>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub logprobs: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_logprobs: Option<u8>,
}

impl RelayRequest {
    pub fn new(messages: Vec<ApiMessage>, temperature: f32) -> Self {
        Self {
            messages,
            temperature,
            logprobs: false,
            top_logprobs: None,
        }
    }

    /// Ask for log-probabilities with up to `top` alternatives per token.
    pub fn with_logprobs(mut self, top: u8) -> Self {
        self.logprobs = true;
        self.top_logprobs = Some(top);
        self
    }
}

/// HTTP client for a chat relay endpoint (e.g. `http://localhost:3001/api/chat`).
pub struct HttpRelay {
    client: Client,
    name: String,
    url: String,
    builder: TokenRecordBuilder,
}

impl HttpRelay {
    /// Create a relay client for `url`.
    ///
    /// `builder` turns the response's log-probabilities into token records.
    pub fn new(url: impl Into<String>, timeout: Duration, builder: TokenRecordBuilder) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SessionError::Config(format!("failed to create HTTP client: {e}")))?;
        let url = url.into();
        Ok(Self {
            client,
            name: url.clone(),
            url,
            builder,
        })
    }

    /// Override the name used in logs.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Relay for HttpRelay {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, request: &RelayRequest) -> Result<ParsedCompletion> {
        debug!(
            relay = %self.name,
            messages = request.messages.len(),
            temperature = request.temperature,
            logprobs = request.logprobs,
            "sending relay request"
        );

        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| SessionError::Upstream(format!("request to {} failed: {e}", self.url)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SessionError::Upstream(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error.message().to_string())
                .unwrap_or_else(|_| format!("HTTP {status}"));
            return Err(SessionError::Upstream(message));
        }

        debug!(relay = %self.name, %status, bytes = body.len(), "relay responded");
        Ok(ParsedCompletion::from_json(&body, &self.builder)?)
    }
}
