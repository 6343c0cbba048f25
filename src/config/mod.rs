pub mod env;
pub use env::apply_env_overrides;

use crate::credentials::SourceMode;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Complete gateway configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub token: TokenConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl GatewayConfig {
    /// Process-wide credential source mode. Fixed once the config is loaded.
    pub fn source_mode(&self) -> SourceMode {
        if self.credentials.strict {
            SourceMode::Strict
        } else {
            SourceMode::Permissive
        }
    }
}

/// Credential resolution and storage
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    /// Reject missing store-backed credentials instead of falling back to env vars
    #[serde(default)]
    pub strict: bool,
    /// SQLite database holding tenant credentials
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Encrypt credential bundles written back after a token refresh.
    /// Requires `TOOLGATE_ENCRYPTION_KEY`.
    #[serde(default = "default_encrypt_at_rest")]
    pub encrypt_at_rest: bool,
}

fn default_db_path() -> String {
    "credentials.db".to_string()
}

fn default_encrypt_at_rest() -> bool {
    false
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            strict: false,
            db_path: default_db_path(),
            encrypt_at_rest: default_encrypt_at_rest(),
        }
    }
}

/// Outbound HTTP client
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_user_agent() -> String {
    "toolgate/0.1".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// OAuth2 token lifecycle
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// Quiet period after a failed automatic refresh (seconds, 0 disables)
    #[serde(default = "default_refresh_backoff_secs")]
    pub refresh_backoff_secs: u64,
}

fn default_refresh_backoff_secs() -> u64 {
    30
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            refresh_backoff_secs: default_refresh_backoff_secs(),
        }
    }
}

/// Execute API server
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    3001
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<GatewayConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&contents).context("Failed to parse config file")
}
