//! Error taxonomy shared by the resolver and every connector.
//!
//! Only [`GatewayError::CredentialMissing`] is allowed to escape connector
//! construction. The other variants are folded into a failed
//! [`ToolResult`](crate::envelope::ToolResult) by the connector that hit them.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Strict mode and the store had no usable credential for this tool.
    #[error("{tool} credentials missing. Set them via the credentials API (environment fallback is disabled in strict mode)")]
    CredentialMissing { tool: String },

    #[error("{0}")]
    NotConfigured(String),

    /// Caller-supplied argument missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// Network failure, timeout or non-2xx upstream response.
    #[error("{0}")]
    Transport(String),
}

impl GatewayError {
    pub fn credential_missing(tool: impl Into<String>) -> Self {
        Self::CredentialMissing { tool: tool.into() }
    }

    /// True for the one variant that aborts connector construction.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CredentialMissing { .. })
    }
}

impl From<reqwest::Error> for GatewayError {
    /// The URL is stripped: several upstreams take the API key as a query parameter.
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.without_url().to_string())
    }
}
