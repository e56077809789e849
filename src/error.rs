use thiserror::Error;

/// Fatal problems found while loading configuration. Raised before any loop starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing credentials: set API_KEY and SECRET_KEY")]
    MissingCredentials,

    #[error("no symbols configured under trading.symbols")]
    NoSymbols,

    #[error("invalid trading parameter {field}: {reason}")]
    InvalidParameter { field: &'static str, reason: String },

    #[error(transparent)]
    Source(#[from] config::ConfigError),
}

/// Errors at the venue boundary (REST queries, order submission, signing).
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("exchange returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
}
