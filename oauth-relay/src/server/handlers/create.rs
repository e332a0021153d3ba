use axum::{
    extract::{Query, State},
    Json,
};

use crate::common::CreateSessionResponse;
use crate::server::{models::CreateSessionParams, AppState};

pub async fn create_session(
    State(state): State<AppState>,
    Query(params): Query<CreateSessionParams>,
) -> Json<CreateSessionResponse> {
    let scope = params
        .scope
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| state.oauth_client.default_scope().to_string());

    let session = state.session_store.create(scope);

    tracing::info!(session_id = %session.session_id, "Created auth session");

    Json(CreateSessionResponse {
        session_id: session.session_id,
    })
}
