pub mod relay_client;
mod config;

pub use self::config::Settings;
pub use relay_client::{RelayClient, RelayClientError};

use serde_json::Value;

use crate::error::AuthError;

/// Load [`Settings`] from `relay-client.toml` (or `OAUTH_RELAY_CLIENT_CONFIG`)
/// and the environment, then run [`authenticate`]
pub async fn authenticate_from_config(scope: Option<&str>) -> Result<Value, AuthError> {
    let settings = Settings::new().map_err(|e| {
        eprintln!("Failed to load relay client configuration: {}", e);
        eprintln!("\nCreate a relay-client.toml with at least:");
        eprintln!("\nserver_url = \"http://localhost:4180\"");
        AuthError::from(e)
    })?;

    authenticate(&settings, scope).await
}

/// Run a complete authorization through the relay: create a session, send
/// the user's browser to the provider and wait for the token data
pub async fn authenticate(settings: &Settings, scope: Option<&str>) -> Result<Value, AuthError> {
    settings.validate().map_err(|e| {
        eprintln!("Configuration validation failed: {}", e);
        AuthError::Configuration(e)
    })?;

    let relay = RelayClient::new(settings)?;

    let session_id = relay.create_session(scope).await?;
    let auth_url = relay.begin_login(&session_id, scope).await?;

    // Open browser
    if let Err(e) = open::that(&auth_url) {
        eprintln!("Failed to open browser automatically: {}", e);
        eprintln!("\nPlease open this URL in your browser:");
        eprintln!("{}\n", auth_url);
    } else {
        println!("Browser opened. Please authorize the application...");
        println!("\nYou can also open this URL directly in your browser:");
        println!("{}\n", auth_url);
    }

    // Poll for completion
    println!("Waiting for authorization...");
    let token_data = relay.wait_for_completion(&session_id).await?;
    tracing::info!(session_id = %session_id, "Authorization completed");

    Ok(token_data)
}
