//! Credential resolution: store first, environment second, strict rejection.

use super::{
    CredentialKey, CredentialRecord, CredentialStore, Environment, OAuth2Credential,
    ResolvedCredential, SourceMode,
};
use crate::error::GatewayError;
use std::sync::Arc;
use tracing::{debug, warn};

/// Which secret shape a tool expects, and its development fallback variables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CredentialProfile {
    /// Single API key. Variables are tried in order.
    ApiKey { env_vars: &'static [&'static str] },
    /// OAuth2 token set. The optional variable supplies a static bearer token.
    OAuth2 { token_env_var: Option<&'static str> },
    /// Self-hosted endpoint: base URL plus a static or OAuth2 token.
    BaseUrl {
        base_url_env_var: &'static str,
        token_env_var: &'static str,
    },
}

impl CredentialProfile {
    pub const fn api_key(env_vars: &'static [&'static str]) -> Self {
        Self::ApiKey { env_vars }
    }

    pub const fn oauth2(token_env_var: Option<&'static str>) -> Self {
        Self::OAuth2 { token_env_var }
    }

    pub const fn base_url(base_url_env_var: &'static str, token_env_var: &'static str) -> Self {
        Self::BaseUrl {
            base_url_env_var,
            token_env_var,
        }
    }
}

/// Where a resolved credential came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialSource {
    Store,
    /// Development fallback (permissive mode only)
    Environment,
}

/// Resolves `(tool, credential id, tenant)` to a usable credential.
///
/// # Policy
/// 1. A store record with a non-empty secret wins (values trimmed only)
/// 2. Otherwise `Strict` fails with [`GatewayError::CredentialMissing`]
/// 3. Otherwise `Permissive` tries the profile's environment variables,
///    returning [`ResolvedCredential::Unconfigured`] if none are set
///
/// Resolution only reads; it never writes to the store.
#[derive(Clone)]
pub struct CredentialResolver {
    store: Arc<dyn CredentialStore>,
    mode: SourceMode,
    env: Arc<dyn Environment>,
}

impl CredentialResolver {
    pub fn new(store: Arc<dyn CredentialStore>, mode: SourceMode, env: Arc<dyn Environment>) -> Self {
        Self { store, mode, env }
    }

    pub fn mode(&self) -> SourceMode {
        self.mode
    }

    /// The backing store (token refreshes persist through it).
    pub fn store(&self) -> Arc<dyn CredentialStore> {
        Arc::clone(&self.store)
    }

    pub fn resolve(
        &self,
        key: &CredentialKey,
        profile: &CredentialProfile,
    ) -> Result<ResolvedCredential, GatewayError> {
        self.resolve_with_source(key, profile)
            .map(|(resolved, _)| resolved)
    }

    /// Like [`resolve`](Self::resolve), also reporting the source.
    pub fn resolve_with_source(
        &self,
        key: &CredentialKey,
        profile: &CredentialProfile,
    ) -> Result<(ResolvedCredential, CredentialSource), GatewayError> {
        if let Some(resolved) = self.from_store(key, profile) {
            debug!(
                tool = %key.tool_name,
                tenant = %key.tenant_slot(),
                "Credential resolved from store"
            );
            return Ok((resolved, CredentialSource::Store));
        }

        match self.mode {
            SourceMode::Strict => {
                warn!(
                    tool = %key.tool_name,
                    tenant = %key.tenant_slot(),
                    "No stored credential in strict mode"
                );
                Err(GatewayError::credential_missing(&key.tool_name))
            }
            SourceMode::Permissive => {
                let resolved = self.from_env(profile);
                debug!(
                    tool = %key.tool_name,
                    tenant = %key.tenant_slot(),
                    configured = resolved.is_configured(),
                    "Credential resolved from environment fallback"
                );
                Ok((resolved, CredentialSource::Environment))
            }
        }
    }

    fn from_store(&self, key: &CredentialKey, profile: &CredentialProfile) -> Option<ResolvedCredential> {
        let record = match self.store.get(key) {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                warn!(credential = %key, error = %e, "Credential store read failed, treating as missing");
                return None;
            }
        };

        let resolved = from_record(&record, profile);
        resolved.is_configured().then_some(resolved)
    }

    fn from_env(&self, profile: &CredentialProfile) -> ResolvedCredential {
        match profile {
            CredentialProfile::ApiKey { env_vars } => env_vars
                .iter()
                .find_map(|name| self.env_text(name))
                .map(|value| ResolvedCredential::ApiKey { value })
                .unwrap_or(ResolvedCredential::Unconfigured),
            CredentialProfile::OAuth2 { token_env_var } => token_env_var
                .and_then(|name| self.env_text(name))
                .map(|token| ResolvedCredential::OAuth2(OAuth2Credential::static_token(token)))
                .unwrap_or(ResolvedCredential::Unconfigured),
            CredentialProfile::BaseUrl {
                base_url_env_var,
                token_env_var,
            } => {
                let base_url = self
                    .env_text(base_url_env_var)
                    .map(|url| normalize_base_url(&url))
                    .filter(|url| !url.is_empty());
                match (base_url, self.env_text(token_env_var)) {
                    (Some(base_url), Some(token)) => ResolvedCredential::BaseUrlAuth {
                        base_url,
                        auth: OAuth2Credential::static_token(token),
                    },
                    _ => ResolvedCredential::Unconfigured,
                }
            }
        }
    }

    fn env_text(&self, name: &str) -> Option<String> {
        self.env
            .var(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

fn from_record(record: &CredentialRecord, profile: &CredentialProfile) -> ResolvedCredential {
    match profile {
        CredentialProfile::ApiKey { .. } => record
            .text("api_key")
            .or_else(|| record.text("key"))
            .map(|value| ResolvedCredential::ApiKey { value })
            .unwrap_or(ResolvedCredential::Unconfigured),
        CredentialProfile::OAuth2 { .. } => {
            ResolvedCredential::OAuth2(OAuth2Credential::from_record(record))
        }
        CredentialProfile::BaseUrl { .. } => ResolvedCredential::BaseUrlAuth {
            base_url: normalize_base_url(&record.text("base_url").unwrap_or_default()),
            auth: OAuth2Credential::from_record(record),
        },
    }
}

/// Trims whitespace and trailing path separators.
pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
