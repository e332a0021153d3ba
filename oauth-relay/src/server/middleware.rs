use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::common::{PROXY_SECRET_HEADER, PROXY_SECRET_QUERY};
use crate::server::{error::ServerError, AppState};

/// Reject requests that do not carry the configured relay secret.
///
/// The secret is read from the `X-Proxy-Secret` header, falling back to the
/// `proxy_secret` query parameter. When no secret is configured the relay
/// runs in open mode and every request passes.
pub async fn require_relay_secret(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let Some(expected) = state.server.relay_secret() else {
        return Ok(next.run(request).await);
    };

    match supplied_secret(&request) {
        Some(supplied) if constant_time_eq(&supplied, expected) => Ok(next.run(request).await),
        _ => {
            tracing::warn!(path = %request.uri().path(), "Rejected request with invalid relay secret");
            Err(ServerError::Unauthorized(
                "Invalid or missing proxy secret".to_string(),
            ))
        }
    }
}

/// Evict expired sessions before the request reaches its handler
pub async fn sweep_expired_sessions(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    state.session_store.sweep_expired();
    next.run(request).await
}

fn supplied_secret(request: &Request) -> Option<String> {
    let from_header = request
        .headers()
        .get(PROXY_SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    from_header.or_else(|| {
        request.uri().query().and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == PROXY_SECRET_QUERY)
                .map(|(_, value)| value.into_owned())
        })
    })
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    if a_bytes.len() == b_bytes.len() {
        a_bytes.ct_eq(b_bytes).into()
    } else {
        // Keep the timing independent of where the inputs differ
        let _ = a_bytes.ct_eq(a_bytes);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::config::{Configuration, OAuthConfiguration, ServerConfiguration};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    fn state_with_secret(secret: Option<&str>) -> AppState {
        AppState::new(&Configuration {
            server: ServerConfiguration {
                proxy_secret: secret.map(str::to_string),
                ..Default::default()
            },
            oauth: OAuthConfiguration::new("http://localhost:4180/callback"),
        })
        .unwrap()
    }

    fn protected_router(state: AppState) -> Router {
        Router::new()
            .route("/protected", get(|| async { "ok" }))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_relay_secret,
            ))
            .with_state(state)
    }

    async fn status_for(state: AppState, request: Request<Body>) -> StatusCode {
        protected_router(state)
            .oneshot(request)
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_open_mode_without_secret() {
        let request = Request::builder()
            .uri("/protected")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status_for(state_with_secret(None), request).await, StatusCode::OK);

        let request = Request::builder()
            .uri("/protected")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            status_for(state_with_secret(Some("")), request).await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_secret_in_header() {
        let request = Request::builder()
            .uri("/protected")
            .header(PROXY_SECRET_HEADER, "s3cret")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            status_for(state_with_secret(Some("s3cret")), request).await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_secret_in_query() {
        let request = Request::builder()
            .uri("/protected?proxy_secret=s3cret")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            status_for(state_with_secret(Some("s3cret")), request).await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_wrong_or_missing_secret_is_unauthorized() {
        let request = Request::builder()
            .uri("/protected")
            .header(PROXY_SECRET_HEADER, "nope")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            status_for(state_with_secret(Some("s3cret")), request).await,
            StatusCode::UNAUTHORIZED
        );

        let request = Request::builder()
            .uri("/protected")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            status_for(state_with_secret(Some("s3cret")), request).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("s3cret", "s3cret"));
        assert!(!constant_time_eq("s3cret", "s3creT"));
        assert!(!constant_time_eq("short", "longer"));
        assert!(constant_time_eq("", ""));
    }
}
