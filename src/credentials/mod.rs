//! Per-tenant credential storage and resolution.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       CredentialResolver                 │
//! │  - store first                           │
//! │  - env fallback (permissive only)        │
//! │  - CredentialMissing (strict only)       │
//! └─────────────────────────────────────────┘
//!          ↓                    ↑
//!        (get)          (save, token refresh)
//!          ↓                    ↑
//! ┌─────────────────────────────────────────┐
//! │       CredentialStore (trait)            │
//! │  SqliteCredentialStore:                  │
//! │  - JSON credential bundles               │
//! │  - AES-256-GCM for encrypted rows        │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use toolgate::credentials::{
//!     CredentialKey, CredentialProfile, CredentialResolver, ProcessEnv,
//!     SourceMode, SqliteCredentialStore,
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let store = Arc::new(SqliteCredentialStore::new("credentials.db", None)?);
//! let resolver = CredentialResolver::new(store, SourceMode::Permissive, Arc::new(ProcessEnv));
//!
//! let key = CredentialKey::new("fmp", "fmp", Some("tenant-1"));
//! let credential = resolver.resolve(&key, &CredentialProfile::api_key(&["FMP_API_KEY"]))?;
//! println!("configured: {}", credential.is_configured());
//! # Ok(())
//! # }
//! ```
//!
//! # Security
//!
//! - Secret values are never logged; `Debug` output of resolved credentials is redacted
//! - Encrypted rows use a unique nonce per write
//! - Tenants never share a record: the tenant is part of every key

mod encryption;
mod environment;
mod resolved;
mod resolver;
mod storage;

pub use encryption::{validate_key, SecretBox};
pub use environment::{Environment, ProcessEnv};
pub use resolved::{OAuth2Credential, ResolvedCredential};
pub use resolver::{CredentialProfile, CredentialResolver, CredentialSource};
pub use storage::SqliteCredentialStore;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Tenant slot used when a credential is not bound to a tenant.
pub const NO_TENANT: &str = "none";

/// Identifies exactly one credential record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialKey {
    pub tool_name: String,
    pub credential_id: String,
    pub tenant_id: Option<String>,
}

impl CredentialKey {
    pub fn new(tool_name: &str, credential_id: &str, tenant_id: Option<&str>) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            credential_id: credential_id.to_string(),
            tenant_id: tenant_id
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
        }
    }

    /// Tenant column value (`"none"` when unscoped).
    pub fn tenant_slot(&self) -> &str {
        self.tenant_id.as_deref().unwrap_or(NO_TENANT)
    }
}

impl fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}@{}",
            self.tool_name,
            self.credential_id,
            self.tenant_slot()
        )
    }
}

/// Kind of secret bundle stored for a credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialType {
    ApiKey,
    #[serde(rename = "oauth2")]
    OAuth2,
    /// Static bearer token (optionally with a base URL)
    Token,
}

impl CredentialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialType::ApiKey => "api_key",
            CredentialType::OAuth2 => "oauth2",
            CredentialType::Token => "token",
        }
    }
}

impl FromStr for CredentialType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "api_key" => Ok(CredentialType::ApiKey),
            "oauth2" => Ok(CredentialType::OAuth2),
            "token" => Ok(CredentialType::Token),
            other => Err(anyhow::anyhow!("Unknown credential type '{}'", other)),
        }
    }
}

/// A stored credential bundle.
///
/// `credential_data` values are strings or numbers (e.g. `expires_at`).
#[derive(Clone, Debug, PartialEq)]
pub struct CredentialRecord {
    pub credential_data: Map<String, Value>,
    pub credential_type: CredentialType,
    pub encrypted: bool,
}

impl CredentialRecord {
    /// Trimmed string field; numbers are rendered, empty strings become `None`.
    pub fn text(&self, field: &str) -> Option<String> {
        let value = match self.credential_data.get(field)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        (!value.is_empty()).then_some(value)
    }

    /// Integer field, accepting JSON numbers or numeric strings.
    pub fn integer(&self, field: &str) -> Option<i64> {
        match self.credential_data.get(field)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Durable credential storage keyed by tool, credential id and tenant.
///
/// Implementations must be safe to share across request tasks.
pub trait CredentialStore: Send + Sync {
    /// Returns the record for `key`, if any.
    fn get(&self, key: &CredentialKey) -> Result<Option<CredentialRecord>>;

    /// Inserts or replaces the record for `key`.
    fn save(
        &self,
        key: &CredentialKey,
        credential_type: CredentialType,
        credential_data: &Map<String, Value>,
        encrypted: bool,
    ) -> Result<()>;

    /// Removes the record for `key`. Returns `false` if none existed.
    fn delete(&self, key: &CredentialKey) -> Result<bool>;
}

/// Where credentials may come from. Fixed at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceMode {
    /// Store only; a missing credential aborts connector construction.
    Strict,
    /// Store, then environment variables; absence is reported as unconfigured.
    Permissive,
}
