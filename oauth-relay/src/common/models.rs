use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Header carrying the shared relay secret
pub const PROXY_SECRET_HEADER: &str = "X-Proxy-Secret";
/// Query parameter alternative to [`PROXY_SECRET_HEADER`]
pub const PROXY_SECRET_QUERY: &str = "proxy_secret";
/// Per-request override of the provider application id
pub const CLIENT_ID_HEADER: &str = "X-Client-Id";
/// Per-request override of the provider application secret
pub const CLIENT_SECRET_HEADER: &str = "X-Client-Secret";

// GET /create_session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

// GET /poll/{session_id}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PollResponse {
    Pending,
    Completed { token_data: Value },
    Error { error: String },
}

impl PollResponse {
    pub fn is_pending(&self) -> bool {
        matches!(self, PollResponse::Pending)
    }
}

// POST /refresh
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}
