//! Connector pool - one connector per (tool, credential id, tenant).
//!
//! Requests for the same key share a connector, and therefore share its
//! token state, so concurrent calls for one tenant trigger at most one token
//! refresh. Keys never cross tenants.
//!
//! Only connectors backed by a stored credential are pooled. Environment
//! fallback credentials carry no refreshable state and are rebuilt per
//! request, so caller-chosen tenant or credential ids cannot grow the pool.

use crate::args::Args;
use crate::registry::{build_connector, find_tool, ConnectorContext};
use crate::Connector;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use toolgate::credentials::CredentialSource;
use toolgate::{CredentialKey, CredentialResolver, GatewayError, ToolResult};
use tracing::{debug, error, info};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error(transparent)]
    Credential(#[from] GatewayError),
}

pub struct ConnectorPool {
    resolver: CredentialResolver,
    context: ConnectorContext,
    connectors: DashMap<CredentialKey, Arc<dyn Connector>>,
}

impl ConnectorPool {
    pub fn new(resolver: CredentialResolver, context: ConnectorContext) -> Self {
        Self {
            resolver,
            context,
            connectors: DashMap::new(),
        }
    }

    pub fn resolver(&self) -> &CredentialResolver {
        &self.resolver
    }

    /// Key for a request. The credential id defaults to the tool name.
    pub fn key(tool: &str, credential_id: Option<&str>, tenant_id: Option<&str>) -> CredentialKey {
        let credential_id = credential_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(tool);
        CredentialKey::new(tool, credential_id, tenant_id)
    }

    /// Returns the pooled connector for `key`, building it on first use.
    ///
    /// Only configured, store-backed connectors are pooled, so a credential
    /// saved later is picked up by the next request. In strict mode a missing
    /// credential fails here with [`GatewayError::CredentialMissing`].
    pub fn connector(&self, key: &CredentialKey) -> Result<Arc<dyn Connector>, HubError> {
        if let Some(existing) = self.connectors.get(key) {
            return Ok(Arc::clone(existing.value()));
        }

        let spec = find_tool(&key.tool_name)
            .ok_or_else(|| HubError::UnknownTool(key.tool_name.clone()))?;
        let (credential, source) = self.resolver.resolve_with_source(key, &spec.profile)?;
        let connector = build_connector(spec, key.clone(), &credential, &self.context);

        if source != CredentialSource::Store || !connector.is_configured() {
            debug!(credential = %key, source = ?source, "Connector not pooled");
            return Ok(connector);
        }

        // A concurrent request may have inserted first; everyone uses the winner
        let pooled = self
            .connectors
            .entry(key.clone())
            .or_insert_with(|| {
                info!(tool = %key.tool_name, tenant = %key.tenant_slot(), "Connector created");
                connector
            })
            .value()
            .clone();
        Ok(pooled)
    }

    /// Runs one operation for a tenant.
    pub async fn execute(
        &self,
        key: &CredentialKey,
        operation: &str,
        args: &Args,
    ) -> Result<ToolResult, HubError> {
        let connector = self.connector(key).map_err(|e| {
            if let HubError::Credential(inner) = &e {
                error!(
                    tool = %key.tool_name,
                    tenant = %key.tenant_slot(),
                    error = %inner,
                    "Connector construction failed"
                );
            }
            e
        })?;

        let result = connector.execute(operation, args).await;
        debug!(
            tool = %key.tool_name,
            tenant = %key.tenant_slot(),
            operation = %operation,
            success = result.success,
            "Operation finished"
        );
        Ok(result)
    }

    /// Drops the pooled connector (after its credential changed).
    pub fn invalidate(&self, key: &CredentialKey) -> bool {
        self.connectors.remove(key).is_some()
    }

    /// Number of pooled connectors.
    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use toolgate::credentials::{CredentialStore, SqliteCredentialStore};
    use toolgate::token::TokenOptions;
    use toolgate::{CredentialType, SourceMode};

    fn pool(mode: SourceMode, env: &[(&str, &str)]) -> (ConnectorPool, Arc<SqliteCredentialStore>) {
        let store = Arc::new(SqliteCredentialStore::new(":memory:", None).unwrap());
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let resolver = CredentialResolver::new(store.clone(), mode, Arc::new(env));
        let context = ConnectorContext::new(reqwest::Client::new(), store.clone(), TokenOptions::default());
        (ConnectorPool::new(resolver, context), store)
    }

    fn save_api_key(store: &SqliteCredentialStore, key: &CredentialKey, value: &str) {
        let data = json!({ "api_key": value });
        store
            .save(key, CredentialType::ApiKey, data.as_object().unwrap(), false)
            .unwrap();
    }

    #[test]
    fn test_key_defaults_credential_id() {
        let key = ConnectorPool::key("fmp", None, Some("t1"));
        assert_eq!(key, CredentialKey::new("fmp", "fmp", Some("t1")));

        let blank = ConnectorPool::key("fmp", Some("  "), None);
        assert_eq!(blank.credential_id, "fmp");

        let custom = ConnectorPool::key("fmp", Some("fmp-pro"), None);
        assert_eq!(custom.credential_id, "fmp-pro");
    }

    #[test]
    fn test_same_key_shares_connector() {
        let (pool, store) = pool(SourceMode::Strict, &[]);
        let key = ConnectorPool::key("fmp", None, Some("t1"));
        save_api_key(&store, &key, "k1");

        let a = pool.connector(&key).unwrap();
        let b = pool.connector(&key).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_tenants_get_separate_connectors() {
        let (pool, store) = pool(SourceMode::Strict, &[]);
        let k1 = ConnectorPool::key("fmp", None, Some("t1"));
        let k2 = ConnectorPool::key("fmp", None, Some("t2"));
        save_api_key(&store, &k1, "k1");
        save_api_key(&store, &k2, "k2");

        let a = pool.connector(&k1).unwrap();
        let b = pool.connector(&k2).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_strict_missing_credential() {
        let (pool, _store) = pool(SourceMode::Strict, &[("FMP_API_KEY", "env-key")]);
        let key = ConnectorPool::key("fmp", None, Some("t1"));

        let err = pool.connector(&key).err().unwrap();
        assert_eq!(err, HubError::Credential(GatewayError::credential_missing("fmp")));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_unknown_tool() {
        let (pool, _store) = pool(SourceMode::Permissive, &[]);
        let key = ConnectorPool::key("github", None, None);
        assert_eq!(
            pool.connector(&key).err().unwrap(),
            HubError::UnknownTool("github".into())
        );
    }

    #[test]
    fn test_unconfigured_not_pooled() {
        let (pool, store) = pool(SourceMode::Permissive, &[]);
        let key = ConnectorPool::key("polygon", None, Some("t1"));

        assert!(!pool.connector(&key).unwrap().is_configured());
        assert!(pool.is_empty());

        save_api_key(&store, &key, "late-key");
        assert!(pool.connector(&key).unwrap().is_configured());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_env_fallback_not_pooled() {
        let (pool, _store) = pool(SourceMode::Permissive, &[("NEWSAPI_KEY", "env-key")]);

        for i in 0..50 {
            let key = ConnectorPool::key("newsapi", Some(&format!("cred-{}", i)), Some(&format!("t{}", i)));
            assert!(pool.connector(&key).unwrap().is_configured());
        }
        assert!(pool.is_empty());
    }

    #[test]
    fn test_invalidate() {
        let (pool, store) = pool(SourceMode::Permissive, &[]);
        let key = ConnectorPool::key("newsapi", None, None);
        save_api_key(&store, &key, "k1");

        pool.connector(&key).unwrap();
        assert!(pool.invalidate(&key));
        assert!(!pool.invalidate(&key));
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn test_permissive_unconfigured_fails_on_use() {
        let (pool, _store) = pool(SourceMode::Permissive, &[]);
        let key = ConnectorPool::key("fmp", None, Some("t1"));

        let result = pool
            .execute(&key, "quote", &Args::from(json!({"symbol": "AAPL"})))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("FMP connector not configured (missing API key)")
        );
    }
}
