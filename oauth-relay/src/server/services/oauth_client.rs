use oauth2::{basic::BasicClient, AuthUrl, ClientId, CsrfToken, RedirectUrl, Scope};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::server::config::OAuthConfiguration;
use crate::server::error::ServerError;
use crate::server::models::ClientCredentials;

#[derive(Debug, Error)]
pub enum TokenExchangeError {
    /// The provider answered with a non-success status
    #[error("provider returned {status}: {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid token response: {0}")]
    InvalidResponse(String),
}

pub struct OAuthClient {
    http_client: reqwest::Client,
    auth_url: AuthUrl,
    token_url: String,
    redirect_url: RedirectUrl,
    redirect_uri: String,
    default_credentials: Option<ClientCredentials>,
    default_client_secret: Option<String>,
    default_scope: String,
}

impl OAuthClient {
    pub fn new(config: &OAuthConfiguration) -> Result<Self, ServerError> {
        let auth_url = AuthUrl::new(config.authorize_url.clone())
            .map_err(|e| ServerError::Configuration(format!("Invalid auth URL: {}", e)))?;

        url::Url::parse(&config.token_url)
            .map_err(|e| ServerError::Configuration(format!("Invalid token URL: {}", e)))?;

        let redirect_url = RedirectUrl::new(config.redirect_uri.clone())
            .map_err(|e| ServerError::Configuration(format!("Invalid redirect URI: {}", e)))?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| ServerError::Configuration(format!("Invalid HTTP client: {}", e)))?;

        let default_client_secret = config.client_secret.clone().filter(|s| !s.is_empty());
        let default_credentials = config
            .client_id
            .clone()
            .filter(|id| !id.is_empty())
            .map(|client_id| ClientCredentials {
                client_id,
                client_secret: default_client_secret.clone(),
            });

        Ok(Self {
            http_client,
            auth_url,
            token_url: config.token_url.clone(),
            redirect_url,
            redirect_uri: config.redirect_uri.clone(),
            default_credentials,
            default_client_secret,
            default_scope: config.default_scope.clone(),
        })
    }

    /// Process-wide provider application credentials, if configured
    pub fn default_credentials(&self) -> Option<&ClientCredentials> {
        self.default_credentials.as_ref()
    }

    pub fn default_client_secret(&self) -> Option<&str> {
        self.default_client_secret.as_deref()
    }

    pub fn default_scope(&self) -> &str {
        &self.default_scope
    }

    /// Build the provider authorization URL. `state` binds the browser
    /// round-trip to a session; every parameter is percent-encoded.
    pub fn build_authorization_url(
        &self,
        credentials: &ClientCredentials,
        scope: &str,
        state: &str,
    ) -> String {
        let csrf_token = CsrfToken::new(state.to_string());
        let client = BasicClient::new(ClientId::new(credentials.client_id.clone()))
            .set_auth_uri(self.auth_url.clone())
            .set_redirect_uri(self.redirect_url.clone());

        let mut request = client.authorize_url(|| csrf_token);
        if !scope.is_empty() {
            request = request.add_scope(Scope::new(scope.to_string()));
        }

        let (auth_url, _) = request.url();
        auth_url.to_string()
    }

    /// Exchange an authorization code for the provider's token response
    pub async fn exchange_code_for_token(
        &self,
        credentials: &ClientCredentials,
        code: &str,
    ) -> Result<Value, TokenExchangeError> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];
        append_credentials(&mut form, credentials);

        let token_data = self.request_token(&form).await?;
        tracing::debug!("Successfully exchanged code for tokens");
        Ok(token_data)
    }

    /// Exchange a refresh token for a new token response
    pub async fn refresh_access_token(
        &self,
        credentials: &ClientCredentials,
        refresh_token: &str,
    ) -> Result<Value, TokenExchangeError> {
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        append_credentials(&mut form, credentials);

        let token_data = self.request_token(&form).await?;
        tracing::debug!("Successfully refreshed tokens");
        Ok(token_data)
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<Value, TokenExchangeError> {
        let response = self
            .http_client
            .post(&self.token_url)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(status = %status, "Token endpoint rejected request");
            return Err(TokenExchangeError::Rejected { status, body });
        }

        serde_json::from_str(&body).map_err(|e| {
            TokenExchangeError::InvalidResponse(format!("Failed to parse token response: {}", e))
        })
    }
}

fn append_credentials<'a>(form: &mut Vec<(&'a str, &'a str)>, credentials: &'a ClientCredentials) {
    form.push(("client_id", &credentials.client_id));
    if let Some(secret) = &credentials.client_secret {
        form.push(("client_secret", secret));
    }
}
