use crate::config::HttpConfig;
use anyhow::{Context, Result};
use std::time::Duration;

/// Build the outbound client shared by connectors and token refreshes.
pub fn build_http_client(config: &HttpConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()
        .context("Failed to build HTTP client")
}
