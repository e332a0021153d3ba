use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Configuration {
    #[serde(default)]
    pub server: ServerConfiguration,
    pub oauth: OAuthConfiguration,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfiguration {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Path prefix when running behind a reverse proxy, e.g. `/spotify`
    #[serde(default)]
    pub base_path: String,

    #[serde(default = "default_session_ttl")]
    pub session_ttl_seconds: u64,

    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,

    /// Shared secret gating the client-facing endpoints. Unset or empty
    /// means the relay is open to anyone who can reach it.
    #[serde(default)]
    pub proxy_secret: Option<String>,

    #[serde(default)]
    pub cors_permissive: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OAuthConfiguration {
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<String>,

    pub redirect_uri: String,

    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,

    #[serde(default = "default_token_url")]
    pub token_url: String,

    #[serde(default = "default_scope")]
    pub default_scope: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for ServerConfiguration {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_path: String::new(),
            session_ttl_seconds: default_session_ttl(),
            cleanup_interval_seconds: default_cleanup_interval(),
            proxy_secret: None,
            cors_permissive: false,
        }
    }
}

impl ServerConfiguration {
    /// The configured relay secret, treating an empty value as unset
    pub fn relay_secret(&self) -> Option<&str> {
        self.proxy_secret.as_deref().filter(|s| !s.is_empty())
    }

    /// Base path without a trailing slash, or empty
    pub fn normalized_base_path(&self) -> String {
        let trimmed = self.base_path.trim_end_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{}", trimmed)
        }
    }
}

impl OAuthConfiguration {
    /// Minimal configuration pointing at the default provider endpoints
    pub fn new(redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: redirect_uri.into(),
            authorize_url: default_authorize_url(),
            token_url: default_token_url(),
            default_scope: default_scope(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4180
}

fn default_session_ttl() -> u64 {
    3600
}

fn default_cleanup_interval() -> u64 {
    60
}

fn default_authorize_url() -> String {
    "https://accounts.spotify.com/authorize".to_string()
}

fn default_token_url() -> String {
    "https://accounts.spotify.com/api/token".to_string()
}

fn default_scope() -> String {
    "user-read-private user-read-email".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

impl Configuration {
    /// Load `config.toml` if present, then `OAUTH_RELAY_<SECTION>__<KEY>`
    /// variables, e.g. `OAUTH_RELAY_OAUTH__CLIENT_ID`
    pub fn new() -> Result<Self, config::ConfigError> {
        Self::load(environment())
    }

    fn load(environment: config::Environment) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        if std::path::Path::new("config.toml").exists() {
            builder = builder.add_source(config::File::with_name("config"));
        }

        builder.add_source(environment).build()?.try_deserialize()
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix("OAUTH_RELAY")
        .prefix_separator("_")
        .separator("__")
}
