use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::common::PollResponse;

/// Provider application credentials used for one authorization flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Pending,
    Completed {
        token_data: Value,
        completed_at: DateTime<Utc>,
    },
    Error {
        message: String,
    },
}

impl SessionState {
    pub fn is_pending(&self) -> bool {
        matches!(self, SessionState::Pending)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Pending => "pending",
            SessionState::Completed { .. } => "completed",
            SessionState::Error { .. } => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session {0} has already been resolved")]
    AlreadyResolved(String),
}

#[derive(Debug, Clone)]
pub struct OAuthSession {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub scope: String,
    /// Recorded when the browser is sent to the provider
    pub credentials: Option<ClientCredentials>,
    pub state: SessionState,
}

impl OAuthSession {
    pub fn new(session_id: String, scope: String, created_at: DateTime<Utc>) -> Self {
        Self {
            session_id,
            created_at,
            scope,
            credentials: None,
            state: SessionState::Pending,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now.signed_duration_since(self.created_at) > ttl
    }

    /// Record the scope and credentials a login was started with
    pub fn begin_login(
        &mut self,
        scope: String,
        credentials: ClientCredentials,
    ) -> Result<(), SessionError> {
        self.ensure_pending()?;
        self.scope = scope;
        self.credentials = Some(credentials);
        Ok(())
    }

    pub fn complete(&mut self, token_data: Value, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.ensure_pending()?;
        self.state = SessionState::Completed {
            token_data,
            completed_at: now,
        };
        Ok(())
    }

    pub fn fail(&mut self, message: String) -> Result<(), SessionError> {
        self.ensure_pending()?;
        self.state = SessionState::Error { message };
        Ok(())
    }

    pub fn poll_response(&self) -> PollResponse {
        match &self.state {
            SessionState::Pending => PollResponse::Pending,
            SessionState::Completed { token_data, .. } => PollResponse::Completed {
                token_data: token_data.clone(),
            },
            SessionState::Error { message } if message.is_empty() => PollResponse::Error {
                error: "Unknown error".to_string(),
            },
            SessionState::Error { message } => PollResponse::Error {
                error: message.clone(),
            },
        }
    }

    fn ensure_pending(&self) -> Result<(), SessionError> {
        if self.state.is_pending() {
            Ok(())
        } else {
            Err(SessionError::AlreadyResolved(self.session_id.clone()))
        }
    }
}
