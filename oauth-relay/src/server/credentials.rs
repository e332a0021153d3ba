use axum::{extract::FromRequestParts, http::request::Parts, http::HeaderMap};

use crate::common::{CLIENT_ID_HEADER, CLIENT_SECRET_HEADER};
use crate::server::{
    error::ServerError, models::ClientCredentials, models::OAuthSession, services::OAuthClient,
};

/// Provider application credentials supplied by the caller through
/// `X-Client-Id` / `X-Client-Secret`, letting one relay serve several apps
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialOverride {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl CredentialOverride {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ServerError> {
        Ok(Self {
            client_id: header_value(headers, CLIENT_ID_HEADER)?,
            client_secret: header_value(headers, CLIENT_SECRET_HEADER)?,
        })
    }

    /// Resolve against the process defaults. A caller-supplied client id
    /// never gets paired with the default secret.
    pub fn resolve(&self, oauth_client: &OAuthClient) -> Result<ClientCredentials, ServerError> {
        if let Some(client_id) = &self.client_id {
            return Ok(ClientCredentials {
                client_id: client_id.clone(),
                client_secret: self.client_secret.clone(),
            });
        }

        let defaults = oauth_client.default_credentials().ok_or_else(|| {
            ServerError::BadRequest("No client ID configured or supplied".to_string())
        })?;

        Ok(ClientCredentials {
            client_id: defaults.client_id.clone(),
            client_secret: self
                .client_secret
                .clone()
                .or_else(|| oauth_client.default_client_secret().map(str::to_string)),
        })
    }
}

impl<S> FromRequestParts<S> for CredentialOverride
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_headers(&parts.headers)
    }
}

/// Credentials for a token exchange bound to an existing session: the ones
/// recorded at login time win, so later default changes do not affect an
/// in-flight flow.
pub fn credentials_for_session(
    session: &OAuthSession,
    fallback: &CredentialOverride,
    oauth_client: &OAuthClient,
) -> Result<ClientCredentials, ServerError> {
    match &session.credentials {
        Some(recorded) => Ok(recorded.clone()),
        None => fallback.resolve(oauth_client),
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Result<Option<String>, ServerError> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map(|s| s.trim().to_string())
                .map_err(|_| ServerError::BadRequest(format!("Invalid {} header", name)))
        })
        .transpose()
        .map(|value| value.filter(|s| !s.is_empty()))
}
