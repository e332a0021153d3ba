use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Relay returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Authentication timed out after {0} seconds")]
    Timeout(u64),

    #[error("Session not found or expired")]
    SessionNotFound,

    #[error("OAuth error: {0}")]
    OAuth(String),

    #[error("Relay did not return a redirect location")]
    MissingLocation,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

// Error body returned by the relay
#[derive(Debug, Deserialize)]
pub(super) struct ErrorBody {
    pub error: String,
}
