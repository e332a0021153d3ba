use axum::{
    extract::{Path, Query, State},
    response::Redirect,
};

use crate::common::PROXY_SECRET_QUERY;
use crate::server::{
    credentials::CredentialOverride, error::ServerError, models::LoginParams, AppState,
};

/// Send the browser to the provider's authorization page for an existing
/// session, recording the scope and credentials the flow was started with
pub async fn login_with_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<LoginParams>,
    overrides: CredentialOverride,
) -> Result<Redirect, ServerError> {
    let span = tracing::info_span!("login", session_id = %session_id);
    let _enter = span.enter();

    if state.session_store.get(&session_id).is_none() {
        tracing::warn!("Login requested for unknown session");
        return Err(ServerError::UnknownSession(session_id));
    }

    let credentials = overrides.resolve(&state.oauth_client)?;
    let requested_scope = params.scope.filter(|s| !s.is_empty());

    let session = state.session_store.update(&session_id, &mut |session| {
        let scope = requested_scope
            .clone()
            .unwrap_or_else(|| session.scope.clone());
        session.begin_login(scope, credentials.clone())
    })?;

    let auth_url = state.oauth_client.build_authorization_url(
        &credentials,
        &session.scope,
        &session.session_id,
    );

    tracing::info!(scope = %session.scope, "Redirecting to provider");

    Ok(Redirect::to(&auth_url))
}

/// Legacy entry point without a session id: creates a session with the
/// default scope and hands over to `/login/{session_id}`
pub async fn legacy_login(
    State(state): State<AppState>,
    Query(params): Query<LoginParams>,
) -> Redirect {
    let session = state
        .session_store
        .create(state.oauth_client.default_scope().to_string());

    let mut target = format!(
        "{}/login/{}",
        state.server.normalized_base_path(),
        session.session_id
    );

    let mut forwarded = url::form_urlencoded::Serializer::new(String::new());
    let mut has_params = false;
    if let Some(scope) = params.scope.as_deref().filter(|s| !s.is_empty()) {
        forwarded.append_pair("scope", scope);
        has_params = true;
    }
    if let Some(secret) = params.proxy_secret.as_deref().filter(|s| !s.is_empty()) {
        forwarded.append_pair(PROXY_SECRET_QUERY, secret);
        has_params = true;
    }
    if has_params {
        target.push('?');
        target.push_str(&forwarded.finish());
    }

    tracing::info!(session_id = %session.session_id, "Created session via legacy login");

    Redirect::to(&target)
}
