use thiserror::Error;

use ti_ingest::IngestError;
use ti_tokens::TokenError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("token error: {0}")]
    Token(#[from] TokenError),
    #[error("{0}")]
    Ingest(#[from] IngestError),
    #[error("step {index} out of range for {len} tokens")]
    OutOfRange { index: usize, len: usize },
    #[error("upstream failure: {0}")]
    Upstream(String),
    #[error("a submission is already in flight")]
    Busy,
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("temperature {0} outside [0, 1]")]
    InvalidTemperature(f32),
    #[error("no assistant message to navigate")]
    NoAssistantMessage,
    #[error("config error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Flat failure categories the presentation layer turns into messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidProbability,
    MalformedResponse,
    MergeMismatch,
    OutOfRange,
    UpstreamFailure,
    /// Session misuse or local setup problems (busy, empty prompt, config).
    Usage,
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Token(e) | SessionError::Ingest(IngestError::Token(e)) => token_kind(e),
            SessionError::Ingest(IngestError::Json(_))
            | SessionError::Ingest(IngestError::MalformedResponse(_)) => ErrorKind::MalformedResponse,
            SessionError::Ingest(IngestError::MergeMismatch(_)) => ErrorKind::MergeMismatch,
            SessionError::Ingest(IngestError::Upstream(_)) | SessionError::Upstream(_) => {
                ErrorKind::UpstreamFailure
            }
            SessionError::OutOfRange { .. } => ErrorKind::OutOfRange,
            SessionError::Busy
            | SessionError::EmptyPrompt
            | SessionError::InvalidTemperature(_)
            | SessionError::NoAssistantMessage
            | SessionError::Config(_)
            | SessionError::Io(_) => ErrorKind::Usage,
        }
    }
}

fn token_kind(e: &TokenError) -> ErrorKind {
    match e {
        TokenError::InvalidProbability(_) => ErrorKind::InvalidProbability,
        TokenError::MalformedResponse(_) => ErrorKind::MalformedResponse,
        TokenError::InvalidThresholds { .. } => ErrorKind::Usage,
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
