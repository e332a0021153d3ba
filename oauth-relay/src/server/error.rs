use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::server::models::SessionError;
use crate::server::services::TokenExchangeError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unknown session id on a path where that is a client input error
    #[error("Invalid session ID: {0}")]
    UnknownSession(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) | ServerError::UnknownSession(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServerError::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServerError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match self {
            ServerError::BadRequest(msg)
            | ServerError::NotFound(msg)
            | ServerError::Unauthorized(msg)
            | ServerError::Provider(msg)
            | ServerError::Upstream(msg)
            | ServerError::Configuration(msg) => msg,
            ServerError::UnknownSession(_) => "Invalid session ID".to_string(),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<SessionError> for ServerError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(id) => ServerError::UnknownSession(id),
            SessionError::AlreadyResolved(_) => ServerError::BadRequest(err.to_string()),
        }
    }
}

impl From<TokenExchangeError> for ServerError {
    fn from(err: TokenExchangeError) -> Self {
        match err {
            TokenExchangeError::Rejected { body, .. } => ServerError::Provider(body),
            TokenExchangeError::Transport(e) => {
                ServerError::Upstream(format!("Token request failed: {}", e))
            }
            TokenExchangeError::InvalidResponse(msg) => ServerError::Provider(msg),
        }
    }
}
