//! OAuth2 `refresh_token` grant against a token endpoint.

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

/// Why a refresh did not produce a new access token.
///
/// Only surfaced by [`TokenManager::force_refresh`](super::TokenManager::force_refresh);
/// automatic refreshes log it and carry on with the current token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("no refresh token available")]
    NoRefreshToken,

    #[error("no token endpoint (token_url and base_url both unset)")]
    NoTokenEndpoint,

    #[error("token endpoint request failed: {0}")]
    Transport(String),

    #[error("token endpoint returned status {0}")]
    Status(u16),

    #[error("token endpoint response had no access_token")]
    MissingAccessToken,
}

/// Token endpoint JSON response. Only `access_token` is required for success.
#[derive(Deserialize, Debug)]
struct TokenRefreshResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// New token material from a successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RefreshedTokens {
    pub access_token: String,
    /// Present only if the provider rotated it
    pub refresh_token: Option<String>,
    /// Seconds; `None` when absent or zero
    pub expires_in: Option<i64>,
}

pub(crate) struct RefreshRequest<'a> {
    pub token_url: &'a str,
    pub refresh_token: &'a str,
    pub client_id: Option<&'a str>,
    pub client_secret: Option<&'a str>,
}

impl RefreshRequest<'_> {
    /// Form fields. `client_id` is always sent (empty when unset).
    fn form(&self) -> Vec<(&str, &str)> {
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", self.refresh_token),
            ("client_id", self.client_id.unwrap_or("")),
        ];
        if let Some(secret) = self.client_secret {
            form.push(("client_secret", secret));
        }
        form
    }

    /// POSTs the grant. Anything but HTTP 200 with an `access_token` is an error.
    pub async fn send(&self, http: &Client) -> Result<RefreshedTokens, RefreshError> {
        let response = http
            .post(self.token_url)
            .header("Accept", "application/json")
            .form(&self.form())
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(RefreshError::Status(response.status().as_u16()));
        }

        let body: TokenRefreshResponse = response
            .json()
            .await
            .map_err(|e| RefreshError::Transport(format!("invalid token response: {}", e)))?;

        let access_token = non_empty(body.access_token).ok_or(RefreshError::MissingAccessToken)?;

        Ok(RefreshedTokens {
            access_token,
            refresh_token: non_empty(body.refresh_token),
            expires_in: body.expires_in.filter(|secs| *secs > 0),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
