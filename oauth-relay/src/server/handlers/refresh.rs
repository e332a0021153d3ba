use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::Value;
use tracing::Instrument;

use crate::common::RefreshRequest;
use crate::server::{
    credentials::{credentials_for_session, CredentialOverride},
    error::ServerError,
    services::TokenExchangeError,
    AppState,
};

/// Relay a refresh-token grant to the provider and pass its response through.
/// Never touches session status.
pub async fn refresh_token(
    State(state): State<AppState>,
    overrides: CredentialOverride,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<Value>, ServerError> {
    let Json(req) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;

    let refresh_token = req
        .refresh_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ServerError::BadRequest("Refresh token is required".to_string()))?;

    let session = req
        .session_id
        .as_deref()
        .and_then(|id| state.session_store.get(id));

    let credentials = match &session {
        Some(session) => credentials_for_session(session, &overrides, &state.oauth_client)?,
        None => overrides.resolve(&state.oauth_client)?,
    };

    let span = tracing::info_span!(
        "refresh_token",
        session_id = req.session_id.as_deref().unwrap_or("-")
    );

    async move {
        tracing::debug!("Token refresh requested");

        let token_data = state
            .oauth_client
            .refresh_access_token(&credentials, &refresh_token)
            .await
            .map_err(|err| match err {
                TokenExchangeError::Rejected { body, .. } => {
                    ServerError::Provider(format!("Error refreshing token: {}", body))
                }
                other => other.into(),
            })?;

        tracing::info!("Token refresh successful");

        Ok(Json(token_data))
    }
    .instrument(span)
    .await
}
