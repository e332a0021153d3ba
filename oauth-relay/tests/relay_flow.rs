use std::sync::Arc;
use std::time::{Duration, Instant};

use oauth_relay::server::{
    self,
    config::{Configuration, OAuthConfiguration, ServerConfiguration},
    AppState,
};
use oauth_relay::testing::ManualClock;
use oauth_relay::{PollResponse, RelayClient, RelayClientError, Settings};
use reqwest::{redirect, StatusCode};
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROXY_SECRET: &str = "relay-secret";

struct TestRelay {
    url: String,
    state: AppState,
    clock: Arc<ManualClock>,
    provider: MockServer,
    browser: reqwest::Client,
}

impl TestRelay {
    async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    async fn start_with(customize: impl FnOnce(&mut Configuration)) -> Self {
        let provider = MockServer::start().await;

        let mut configuration = Configuration {
            server: ServerConfiguration {
                proxy_secret: Some(PROXY_SECRET.to_string()),
                ..Default::default()
            },
            oauth: OAuthConfiguration {
                client_id: Some("default-id".to_string()),
                client_secret: Some("default-secret".to_string()),
                token_url: format!("{}/api/token", provider.uri()),
                ..OAuthConfiguration::new("http://127.0.0.1:4180/callback")
            },
        };
        customize(&mut configuration);

        let clock = Arc::new(ManualClock::default());
        let state = AppState::with_clock(&configuration, clock.clone()).unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = server::router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let browser = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .unwrap();

        Self {
            url: format!("http://{}", addr),
            state,
            clock,
            provider,
            browser,
        }
    }

    fn client(&self) -> RelayClient {
        let mut settings = Settings::for_server(self.url.clone());
        settings.proxy_secret = Some(PROXY_SECRET.to_string());
        settings.poll_interval_ms = 10;
        settings.poll_timeout_secs = 5;
        RelayClient::new(&settings).unwrap()
    }

    fn tenant_client(&self, client_id: &str) -> RelayClient {
        let mut settings = Settings::for_server(self.url.clone());
        settings.proxy_secret = Some(PROXY_SECRET.to_string());
        settings.client_id = Some(client_id.to_string());
        settings.client_secret = Some(format!("{}-secret", client_id));
        RelayClient::new(&settings).unwrap()
    }

    /// What the provider's redirect back to the relay looks like
    async fn callback(&self, query: &str) -> reqwest::Response {
        self.browser
            .get(format!("{}/callback?{}", self.url, query))
            .send()
            .await
            .unwrap()
    }

    async fn mount_token_endpoint(&self, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.provider)
            .await;
    }
}

fn token_payload() -> Value {
    json!({
        "access_token": "access-1",
        "token_type": "Bearer",
        "scope": "read",
        "expires_in": 3600,
        "refresh_token": "refresh-1"
    })
}

#[tokio::test]
async fn test_full_flow_then_expiry() {
    let relay = TestRelay::start().await;
    relay.mount_token_endpoint(200, token_payload()).await;
    let client = relay.client();

    let session_id = client.create_session(None).await.unwrap();
    assert_eq!(
        client.poll_session(&session_id).await.unwrap(),
        PollResponse::Pending
    );

    let auth_url = client.begin_login(&session_id, Some("read")).await.unwrap();
    assert!(auth_url.starts_with("https://accounts.spotify.com/authorize?"));
    assert!(auth_url.contains("scope=read"));
    assert!(auth_url.contains(&format!("state={}", session_id)));
    assert!(auth_url.contains("response_type=code"));
    assert!(auth_url.contains("client_id=default-id"));
    assert_eq!(
        relay.state.session_store.get(&session_id).unwrap().scope,
        "read"
    );

    let resp = relay
        .callback(&format!("code=auth-code&state={}", session_id))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.text().await.unwrap().contains(&session_id));

    let token_data = client.wait_for_completion(&session_id).await.unwrap();
    assert_eq!(token_data, token_payload());

    // Terminal state is stable across polls
    for _ in 0..3 {
        assert_eq!(
            client.poll_session(&session_id).await.unwrap(),
            PollResponse::Completed {
                token_data: token_payload()
            }
        );
    }

    relay.clock.advance(chrono::Duration::hours(2));
    let err = client.poll_session(&session_id).await.unwrap_err();
    assert!(matches!(err, RelayClientError::SessionNotFound));
    assert!(relay.state.session_store.is_empty());
}

#[tokio::test]
async fn test_create_session_records_scope_override() {
    let relay = TestRelay::start().await;
    let client = relay.client();

    let session_id = client.create_session(Some("playlist-read")).await.unwrap();
    assert_eq!(
        relay.state.session_store.get(&session_id).unwrap().scope,
        "playlist-read"
    );

    let auth_url = client.begin_login(&session_id, None).await.unwrap();
    assert!(auth_url.contains("scope=playlist-read"));

    let default_id = client.create_session(None).await.unwrap();
    assert_eq!(
        relay.state.session_store.get(&default_id).unwrap().scope,
        "user-read-private user-read-email"
    );
}

#[tokio::test]
async fn test_begin_login_unknown_session() {
    let relay = TestRelay::start().await;

    let err = relay
        .client()
        .begin_login("does-not-exist", None)
        .await
        .unwrap_err();

    match err {
        RelayClientError::Status { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Invalid session ID");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(relay.state.session_store.is_empty());
}

#[tokio::test]
async fn test_provider_rejection_marks_session_error() {
    let relay = TestRelay::start().await;
    relay
        .mount_token_endpoint(400, json!({"error": "invalid_grant"}))
        .await;
    let client = relay.client();

    let session_id = client.create_session(None).await.unwrap();
    client.begin_login(&session_id, None).await.unwrap();

    let resp = relay
        .callback(&format!("code=stale&state={}", session_id))
        .await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body["error"],
        r#"Error getting access token: {"error":"invalid_grant"}"#
    );

    assert_eq!(
        client.poll_session(&session_id).await.unwrap(),
        PollResponse::Error {
            error: r#"{"error":"invalid_grant"}"#.to_string()
        }
    );

    let err = client.wait_for_completion(&session_id).await.unwrap_err();
    assert!(matches!(err, RelayClientError::OAuth(_)));
}

#[tokio::test]
async fn test_callback_rejects_unknown_state_without_mutation() {
    let relay = TestRelay::start().await;
    relay.mount_token_endpoint(200, token_payload()).await;
    let client = relay.client();
    let session_id = client.create_session(None).await.unwrap();

    let resp = relay.callback("code=abc&state=not-a-session").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = relay.callback(&format!("state={}", session_id)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = relay.callback("code=abc").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    assert_eq!(
        client.poll_session(&session_id).await.unwrap(),
        PollResponse::Pending
    );
    assert!(relay
        .provider
        .received_requests()
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_second_callback_does_not_overwrite_result() {
    let relay = TestRelay::start().await;
    relay.mount_token_endpoint(200, token_payload()).await;
    let client = relay.client();
    let session_id = client.create_session(None).await.unwrap();
    client.begin_login(&session_id, None).await.unwrap();

    let first = relay
        .callback(&format!("code=one&state={}", session_id))
        .await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = relay
        .callback(&format!("error=access_denied&state={}", session_id))
        .await;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);

    let replay = relay
        .callback(&format!("code=two&state={}", session_id))
        .await;
    assert_eq!(replay.status(), StatusCode::BAD_REQUEST);

    assert_eq!(
        client.poll_session(&session_id).await.unwrap(),
        PollResponse::Completed {
            token_data: token_payload()
        }
    );
    assert_eq!(relay.provider.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_provider_denial_marks_session_error() {
    let relay = TestRelay::start().await;
    let client = relay.client();
    let session_id = client.create_session(None).await.unwrap();

    let resp = relay
        .callback(&format!(
            "error=access_denied&error_description=User+denied&state={}",
            session_id
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    assert_eq!(
        client.poll_session(&session_id).await.unwrap(),
        PollResponse::Error {
            error: "access_denied: User denied".to_string()
        }
    );
}

#[tokio::test]
async fn test_recorded_credentials_are_used_for_callback_and_refresh() {
    let relay = TestRelay::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("client_id=tenant-a"))
        .and(body_string_contains("client_secret=tenant-a-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_payload()))
        .expect(1)
        .mount(&relay.provider)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .and(body_string_contains("client_id=tenant-a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "access-2"})))
        .expect(1)
        .mount(&relay.provider)
        .await;

    let tenant = relay.tenant_client("tenant-a");
    let session_id = tenant.create_session(None).await.unwrap();
    let auth_url = tenant.begin_login(&session_id, None).await.unwrap();
    assert!(auth_url.contains("client_id=tenant-a"));

    let resp = relay
        .callback(&format!("code=abc&state={}", session_id))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    // A different caller identity does not change what the session recorded
    let other = relay.tenant_client("tenant-b");
    let refreshed = other
        .refresh("refresh-1", Some(&session_id))
        .await
        .unwrap();
    assert_eq!(refreshed, json!({"access_token": "access-2"}));

    // Refresh never touches the session result
    assert_eq!(
        relay.client().poll_session(&session_id).await.unwrap(),
        PollResponse::Completed {
            token_data: token_payload()
        }
    );
}

#[tokio::test]
async fn test_refresh_without_session_uses_override_then_defaults() {
    let relay = TestRelay::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("client_id=tenant-b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"who": "tenant-b"})))
        .mount(&relay.provider)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("client_id=default-id"))
        .and(body_string_contains("client_secret=default-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"who": "default"})))
        .mount(&relay.provider)
        .await;

    let via_override = relay
        .tenant_client("tenant-b")
        .refresh("rt", Some("unknown-session"))
        .await
        .unwrap();
    assert_eq!(via_override["who"], "tenant-b");

    let via_default = relay.client().refresh("rt", None).await.unwrap();
    assert_eq!(via_default["who"], "default");
}

#[tokio::test]
async fn test_refresh_failure_and_missing_token() {
    let relay = TestRelay::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .expect(1)
        .mount(&relay.provider)
        .await;

    let err = relay.client().refresh("revoked", None).await.unwrap_err();
    assert!(matches!(
        err,
        RelayClientError::Status { status: 500, ref message }
            if message == "Error refreshing token: invalid_grant"
    ));

    let resp = relay
        .browser
        .post(format!("{}/refresh", relay.url))
        .header("X-Proxy-Secret", PROXY_SECRET)
        .json(&json!({"session_id": "whatever"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Refresh token is required");
}

#[tokio::test]
async fn test_relay_secret_gates_client_endpoints() {
    let relay = TestRelay::start().await;

    for path in ["/create_session", "/poll/abc", "/login/abc"] {
        let resp = relay
            .browser
            .get(format!("{}{}", relay.url, path))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{}", path);
    }

    let resp = relay
        .browser
        .get(format!(
            "{}/create_session?proxy_secret={}",
            relay.url, PROXY_SECRET
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // Provider-facing and browser-facing routes stay open
    let resp = relay.callback("code=abc&state=nope").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let resp = relay
        .browser
        .get(format!("{}/health", relay.url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_legacy_login_hands_over_to_session_login() {
    let relay = TestRelay::start().await;

    let resp = relay
        .browser
        .get(format!(
            "{}/login?proxy_secret={}",
            relay.url, PROXY_SECRET
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let location = resp.headers()["location"].to_str().unwrap().to_string();
    assert!(location.starts_with("/login/"));
    assert!(location.ends_with(&format!("?proxy_secret={}", PROXY_SECRET)));
    assert_eq!(relay.state.session_store.len(), 1);

    let resp = relay
        .browser
        .get(format!("{}{}", relay.url, location))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert!(resp.headers()["location"]
        .to_str()
        .unwrap()
        .starts_with("https://accounts.spotify.com/authorize?"));
}

#[tokio::test]
async fn test_slow_provider_times_out_as_bad_gateway() {
    let relay = TestRelay::start_with(|configuration| {
        configuration.oauth.request_timeout_seconds = 1;
    })
    .await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_payload())
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&relay.provider)
        .await;
    let client = relay.client();
    let session_id = client.create_session(None).await.unwrap();

    let started = Instant::now();
    let resp = relay
        .callback(&format!("code=abc&state={}", session_id))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert!(started.elapsed() < Duration::from_secs(3));

    match client.poll_session(&session_id).await.unwrap() {
        PollResponse::Error { error } => assert!(error.contains("token request failed")),
        other => panic!("unexpected poll response: {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_provider_is_bad_gateway() {
    let relay = TestRelay::start_with(|configuration| {
        // Nothing listens on the discard port
        configuration.oauth.token_url = "http://127.0.0.1:9/api/token".to_string();
    })
    .await;
    let client = relay.client();
    let session_id = client.create_session(None).await.unwrap();

    let resp = relay
        .callback(&format!("code=abc&state={}", session_id))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert!(matches!(
        client.poll_session(&session_id).await.unwrap(),
        PollResponse::Error { .. }
    ));
}

#[tokio::test]
async fn test_client_id_override_is_sent_without_default_secret() {
    let relay = TestRelay::start().await;
    relay
        .mount_token_endpoint(200, json!({"access_token": "access-3"}))
        .await;

    let mut settings = Settings::for_server(relay.url.clone());
    settings.proxy_secret = Some(PROXY_SECRET.to_string());
    settings.client_id = Some("public-app".to_string());
    let public_app = RelayClient::new(&settings).unwrap();

    public_app.refresh("rt", None).await.unwrap();

    let requests = relay.provider.received_requests().await.unwrap();
    let body = String::from_utf8(requests[0].body.clone()).unwrap();
    assert!(body.contains("client_id=public-app"));
    assert!(!body.contains("client_secret"));
}
