use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("token error: {0}")]
    Token(#[from] ti_tokens::TokenError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("merge mismatch: {0}")]
    MergeMismatch(String),
    #[error("upstream failure: {0}")]
    Upstream(String),
}

pub type Result<T> = std::result::Result<T, IngestError>;
