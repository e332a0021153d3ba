use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tracing::Instrument;

use crate::server::{
    credentials::{credentials_for_session, CredentialOverride},
    error::ServerError,
    models::{CallbackParams, SessionError},
    services::TokenExchangeError,
    AppState,
};

const SUCCESS_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Authentication Successful</title>
    <style>
        body {
            margin: 0;
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, "Helvetica Neue", Arial, sans-serif;
            background: #121212;
            display: flex;
            justify-content: center;
            align-items: center;
            height: 100vh;
        }
        .container {
            background: white;
            border-radius: 12px;
            padding: 48px;
            text-align: center;
            max-width: 400px;
        }
        h1 { color: #1DB954; margin: 0 0 12px 0; font-size: 24px; }
        p { color: #4B5563; line-height: 1.5; }
        small { color: #9CA3AF; }
    </style>
</head>
<body>
    <div class="container">
        <h1>Authentication Successful</h1>
        <p>You have successfully authenticated. You can close this window now.</p>
        <p><small>Session ID: {SESSION_ID}</small></p>
    </div>
</body>
</html>"#;

const ERROR_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Authentication Failed</title>
</head>
<body>
    <h1>Authentication Failed</h1>
    <p>The authorization request was not approved. Please close this window and try again from your application.</p>
</body>
</html>"#;

pub async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, ServerError> {
    // The state parameter is the session_id
    let session_id = params
        .state
        .clone()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ServerError::BadRequest("Missing authorization code or session ID".to_string())
        })?;

    let span = tracing::info_span!("oauth_callback", session_id = %session_id);
    handle_callback(state, session_id, params)
        .instrument(span)
        .await
}

async fn handle_callback(
    state: AppState,
    session_id: String,
    params: CallbackParams,
) -> Result<Response, ServerError> {
    // Provider-side failure, e.g. the user denied access
    if let Some(error) = params.error.filter(|e| !e.is_empty()) {
        let message = match params.error_description {
            Some(description) if !description.is_empty() => format!("{}: {}", error, description),
            _ => error,
        };
        state
            .session_store
            .update(&session_id, &mut |s| s.fail(message.clone()))?;

        tracing::warn!(error = %message, "OAuth callback error");

        return Ok((StatusCode::BAD_REQUEST, Html(ERROR_HTML)).into_response());
    }

    let code = params.code.filter(|c| !c.is_empty()).ok_or_else(|| {
        ServerError::BadRequest("Missing authorization code or session ID".to_string())
    })?;

    let session = state
        .session_store
        .get(&session_id)
        .ok_or_else(|| ServerError::UnknownSession(session_id.clone()))?;

    if !session.state.is_pending() {
        return Err(SessionError::AlreadyResolved(session_id).into());
    }

    let credentials =
        credentials_for_session(&session, &CredentialOverride::default(), &state.oauth_client)?;

    // No store lock is held while the exchange is in flight
    match state
        .oauth_client
        .exchange_code_for_token(&credentials, &code)
        .await
    {
        Ok(token_data) => {
            let now = state.clock.now();
            state
                .session_store
                .update(&session_id, &mut |s| s.complete(token_data.clone(), now))?;

            tracing::info!("OAuth callback successful");

            Ok(Html(SUCCESS_HTML.replace("{SESSION_ID}", &session_id)).into_response())
        }
        Err(TokenExchangeError::Rejected { body, .. }) => {
            record_failure(&state, &session_id, body.clone());
            Err(ServerError::Provider(format!(
                "Error getting access token: {}",
                body
            )))
        }
        Err(err) => {
            record_failure(&state, &session_id, err.to_string());
            Err(err.into())
        }
    }
}

fn record_failure(state: &AppState, session_id: &str, message: String) {
    if let Err(err) = state
        .session_store
        .update(session_id, &mut |s| s.fail(message.clone()))
    {
        tracing::warn!(error = %err, "Could not record token exchange failure");
    } else {
        tracing::warn!(error = %message, "Token exchange failed");
    }
}
