pub mod config;
pub mod credentials;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

pub use self::config::Configuration;
pub use error::ServerError;

use axum::{
    body::Body,
    http::Request,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use self::config::ServerConfiguration;
use services::{Clock, InMemorySessionStore, OAuthClient, SessionStore, SystemClock};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub session_store: Arc<dyn SessionStore>,
    pub oauth_client: Arc<OAuthClient>,
    pub server: Arc<ServerConfiguration>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(configuration: &Configuration) -> Result<Self, ServerError> {
        Self::with_clock(configuration, Arc::new(SystemClock))
    }

    pub fn with_clock(
        configuration: &Configuration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ServerError> {
        let session_store = Arc::new(InMemorySessionStore::with_clock(
            configuration.server.session_ttl_seconds,
            clock.clone(),
        ));
        let oauth_client = Arc::new(OAuthClient::new(&configuration.oauth)?);

        Ok(Self {
            session_store,
            oauth_client,
            server: Arc::new(configuration.server.clone()),
            clock,
        })
    }
}

/// Build the relay router. Every route runs the expiry sweep first; the
/// client-facing routes additionally require the relay secret.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/create_session", get(handlers::create_session))
        .route("/login/{session_id}", get(handlers::login_with_session))
        .route("/poll/{session_id}", get(handlers::poll_session))
        .route("/refresh", post(handlers::refresh_token))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::require_relay_secret,
        ));

    let open = Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health_check))
        .route("/login", get(handlers::legacy_login))
        .route("/callback", get(handlers::oauth_callback));

    let mut app = protected.merge(open).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http().make_span_with(request_span))
            .layer(from_fn_with_state(
                state.clone(),
                middleware::sweep_expired_sessions,
            ))
            .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
    );

    if state.server.cors_permissive {
        app = app.layer(CorsLayer::permissive());
    }

    app.with_state(state)
}

/// Span for an incoming request. Only the path is recorded: query strings
/// carry the relay secret and authorization codes.
fn request_span(request: &Request<Body>) -> tracing::Span {
    tracing::debug_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
    )
}
