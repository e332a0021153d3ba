mod models;

pub use models::RelayClientError;
use models::ErrorBody;

use reqwest::{header::LOCATION, redirect, Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::{Duration, Instant};

use crate::client::Settings;
use crate::common::{
    CreateSessionResponse, PollResponse, RefreshRequest, CLIENT_ID_HEADER, CLIENT_SECRET_HEADER,
    PROXY_SECRET_HEADER,
};

pub struct RelayClient {
    http_client: Client,
    server_url: String,
    proxy_secret: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl RelayClient {
    pub fn new(settings: &Settings) -> Result<Self, RelayClientError> {
        settings
            .validate()
            .map_err(RelayClientError::Configuration)?;

        // Redirects are inspected, not followed: /login answers with the
        // provider URL the browser should open
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            http_client,
            server_url: settings.server_url.trim_end_matches('/').to_string(),
            proxy_secret: settings.proxy_secret.clone().filter(|s| !s.is_empty()),
            client_id: settings.client_id.clone().filter(|s| !s.is_empty()),
            client_secret: settings.client_secret.clone().filter(|s| !s.is_empty()),
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            poll_timeout: Duration::from_secs(settings.poll_timeout_secs),
        })
    }

    pub async fn create_session(&self, scope: Option<&str>) -> Result<String, RelayClientError> {
        let mut request = self.request(Method::GET, "/create_session");
        if let Some(scope) = scope {
            request = request.query(&[("scope", scope)]);
        }

        let resp = check_status(request.send().await?)
            .await?
            .json::<CreateSessionResponse>()
            .await?;

        Ok(resp.session_id)
    }

    /// Start the login for `session_id` and return the provider authorization
    /// URL the end user has to open
    pub async fn begin_login(
        &self,
        session_id: &str,
        scope: Option<&str>,
    ) -> Result<String, RelayClientError> {
        let mut request = self.request(Method::GET, &format!("/login/{}", session_id));
        if let Some(scope) = scope {
            request = request.query(&[("scope", scope)]);
        }

        let resp = check_status(request.send().await?).await?;

        resp.headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or(RelayClientError::MissingLocation)
    }

    pub async fn poll_session(&self, session_id: &str) -> Result<PollResponse, RelayClientError> {
        let resp = self
            .request(Method::GET, &format!("/poll/{}", session_id))
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(RelayClientError::SessionNotFound);
        }

        Ok(check_status(resp).await?.json::<PollResponse>().await?)
    }

    /// Poll until the session leaves `pending`, returning the provider token data
    pub async fn wait_for_completion(&self, session_id: &str) -> Result<Value, RelayClientError> {
        let start = Instant::now();

        loop {
            if start.elapsed() > self.poll_timeout {
                return Err(RelayClientError::Timeout(self.poll_timeout.as_secs()));
            }

            match self.poll_session(session_id).await? {
                PollResponse::Completed { token_data } => return Ok(token_data),
                PollResponse::Error { error } => return Err(RelayClientError::OAuth(error)),
                PollResponse::Pending => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }

    pub async fn refresh(
        &self,
        refresh_token: &str,
        session_id: Option<&str>,
    ) -> Result<Value, RelayClientError> {
        let req = RefreshRequest {
            refresh_token: Some(refresh_token.to_string()),
            session_id: session_id.map(str::to_string),
        };

        let resp = self
            .request(Method::POST, "/refresh")
            .json(&req)
            .send()
            .await?;

        Ok(check_status(resp).await?.json::<Value>().await?)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .http_client
            .request(method, format!("{}{}", self.server_url, path));

        if let Some(secret) = &self.proxy_secret {
            builder = builder.header(PROXY_SECRET_HEADER, secret);
        }
        if let Some(client_id) = &self.client_id {
            builder = builder.header(CLIENT_ID_HEADER, client_id);
        }
        if let Some(client_secret) = &self.client_secret {
            builder = builder.header(CLIENT_SECRET_HEADER, client_secret);
        }
        builder
    }
}

async fn check_status(resp: Response) -> Result<Response, RelayClientError> {
    let status = resp.status();
    if status.is_success() || status.is_redirection() {
        return Ok(resp);
    }

    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);

    Err(RelayClientError::Status {
        status: status.as_u16(),
        message,
    })
}
