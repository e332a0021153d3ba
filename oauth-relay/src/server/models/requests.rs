use serde::{Deserialize, Serialize};

// GET /create_session
#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionParams {
    pub scope: Option<String>,
}

// GET /login and GET /login/{session_id}
#[derive(Debug, Default, Deserialize)]
pub struct LoginParams {
    pub scope: Option<String>,
    pub proxy_secret: Option<String>,
}

// GET /callback
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

// Health check
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub sessions: usize,
}
