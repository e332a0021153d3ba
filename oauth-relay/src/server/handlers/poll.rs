use axum::{
    extract::{Path, State},
    Json,
};

use crate::common::PollResponse;
use crate::server::{error::ServerError, AppState};

pub async fn poll_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<PollResponse>, ServerError> {
    let session = state.session_store.get(&session_id).ok_or_else(|| {
        tracing::debug!(session_id = %session_id, "Poll for unknown session");
        ServerError::NotFound("Invalid session ID".to_string())
    })?;

    tracing::debug!(
        session_id = %session_id,
        status = session.state.label(),
        "Session polled"
    );

    Ok(Json(session.poll_response()))
}
