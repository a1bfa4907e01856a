use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TokenError {
    #[error("invalid probability: log-probability {0} is not a number")]
    InvalidProbability(f64),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("invalid tier thresholds: high={high}, medium={medium}")]
    InvalidThresholds { high: f64, medium: f64 },
}

pub type Result<T> = std::result::Result<T, TokenError>;
