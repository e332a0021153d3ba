use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Relay secret, sent as `X-Proxy-Secret`
    #[serde(default)]
    pub proxy_secret: Option<String>,

    /// Provider application credentials overriding the relay's defaults
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

fn default_server_url() -> String {
    "http://localhost:4180".to_string()
}

fn default_poll_interval() -> u64 {
    2000
}

fn default_poll_timeout() -> u64 {
    300
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = std::env::var("OAUTH_RELAY_CLIENT_CONFIG")
            .unwrap_or_else(|_| "relay-client.toml".to_string());

        Self::from_file(&config_path)
    }

    /// Load from the given file (if present), then `OAUTH_RELAY_CLIENT__*` variables
    pub fn from_file(config_path: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("OAUTH_RELAY_CLIENT").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    /// Settings for a relay at `server_url` with every other value defaulted
    pub fn for_server(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            proxy_secret: None,
            client_id: None,
            client_secret: None,
            poll_interval_ms: default_poll_interval(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server_url.is_empty() {
            return Err("server_url is required".to_string());
        }
        if !self.server_url.starts_with("http") {
            return Err("server_url must be a valid HTTP(S) URL".to_string());
        }
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be greater than zero".to_string());
        }
        Ok(())
    }
}
