mod callback;
mod create;
mod login;
mod poll;
mod refresh;

pub use callback::oauth_callback;
pub use create::create_session;
pub use login::{legacy_login, login_with_session};
pub use poll::poll_session;
pub use refresh::refresh_token;

use crate::server::{models::HealthResponse, AppState};
use axum::{extract::State, response::Html, Json};

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        sessions: state.session_store.len(),
    })
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        r#"<html>
  <head><title>OAuth Relay</title></head>
  <body>
    <h1>OAuth Relay</h1>
    <a href="{}/login">Log in</a>
  </body>
</html>"#,
        state.server.normalized_base_path()
    ))
}
