//! Connector registry: supported tools and how to build them.

use crate::connectors::{
    fmp, gemini, home_assistant, newsapi, polygon, FmpConnector, GeminiConnector,
    HomeAssistantConnector, NewsApiConnector, PolygonConnector,
};
use crate::Connector;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use toolgate::credentials::CredentialStore;
use toolgate::token::TokenOptions;
use toolgate::{CredentialKey, CredentialProfile, ResolvedCredential};

/// Static description of a supported tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    #[serde(skip)]
    pub profile: CredentialProfile,
    pub operations: &'static [&'static str],
}

const TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: fmp::TOOL_NAME,
        profile: CredentialProfile::api_key(&["FMP_API_KEY"]),
        operations: fmp::OPERATIONS,
    },
    ToolSpec {
        name: polygon::TOOL_NAME,
        profile: CredentialProfile::api_key(&["POLYGON_API_KEY"]),
        operations: polygon::OPERATIONS,
    },
    ToolSpec {
        name: newsapi::TOOL_NAME,
        profile: CredentialProfile::api_key(&["NEWSAPI_KEY"]),
        operations: newsapi::OPERATIONS,
    },
    ToolSpec {
        name: gemini::TOOL_NAME,
        profile: CredentialProfile::api_key(&["GEMINI_API_KEY", "GOOGLE_API_KEY"]),
        operations: gemini::OPERATIONS,
    },
    ToolSpec {
        name: home_assistant::TOOL_NAME,
        profile: CredentialProfile::base_url("HOME_ASSISTANT_BASE_URL", "HOME_ASSISTANT_TOKEN"),
        operations: home_assistant::OPERATIONS,
    },
];

/// Returns all supported tools.
pub fn all_tools() -> &'static [ToolSpec] {
    TOOLS
}

pub fn find_tool(name: &str) -> Option<&'static ToolSpec> {
    TOOLS.iter().find(|t| t.name == name)
}

/// Shared dependencies handed to every connector.
#[derive(Clone)]
pub struct ConnectorContext {
    pub http: reqwest::Client,
    pub store: Arc<dyn CredentialStore>,
    pub token_options: TokenOptions,
    /// Per-tool API root overrides (mock servers, proxies)
    pub base_urls: HashMap<String, String>,
}

impl ConnectorContext {
    pub fn new(http: reqwest::Client, store: Arc<dyn CredentialStore>, token_options: TokenOptions) -> Self {
        Self {
            http,
            store,
            token_options,
            base_urls: HashMap::new(),
        }
    }

    pub fn with_base_url(mut self, tool: &str, base_url: impl Into<String>) -> Self {
        self.base_urls.insert(tool.to_string(), base_url.into());
        self
    }
}

/// Builds the connector for `spec` around an already resolved credential.
pub fn build_connector(
    spec: &ToolSpec,
    key: CredentialKey,
    credential: &ResolvedCredential,
    context: &ConnectorContext,
) -> Arc<dyn Connector> {
    let http = context.http.clone();
    let base_url = context.base_urls.get(spec.name).cloned();

    macro_rules! api_key_connector {
        ($ty:ty) => {{
            let connector = <$ty>::new(credential, http);
            match base_url {
                Some(url) => Arc::new(connector.with_base_url(url)) as Arc<dyn Connector>,
                None => Arc::new(connector) as Arc<dyn Connector>,
            }
        }};
    }

    match spec.name {
        fmp::TOOL_NAME => api_key_connector!(FmpConnector),
        polygon::TOOL_NAME => api_key_connector!(PolygonConnector),
        newsapi::TOOL_NAME => api_key_connector!(NewsApiConnector),
        gemini::TOOL_NAME => api_key_connector!(GeminiConnector),
        _ => Arc::new(HomeAssistantConnector::new(
            key,
            credential,
            Arc::clone(&context.store),
            http,
            context.token_options.clone(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolgate::credentials::SqliteCredentialStore;

    fn context() -> ConnectorContext {
        ConnectorContext::new(
            reqwest::Client::new(),
            Arc::new(SqliteCredentialStore::new(":memory:", None).unwrap()),
            TokenOptions::default(),
        )
    }

    #[test]
    fn test_all_tools() {
        let names: Vec<_> = all_tools().iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec!["fmp", "polygon", "newsapi", "gemini", "home_assistant"]
        );
    }

    #[test]
    fn test_find_tool() {
        assert_eq!(find_tool("gemini").unwrap().operations, gemini::OPERATIONS);
        assert!(find_tool("github").is_none());
    }

    #[test]
    fn test_build_every_tool() {
        let context = context();
        for spec in all_tools() {
            let key = CredentialKey::new(spec.name, spec.name, Some("t1"));
            let connector = build_connector(spec, key, &ResolvedCredential::Unconfigured, &context);
            assert_eq!(connector.name(), spec.name);
            assert_eq!(connector.operations(), spec.operations);
            assert!(!connector.is_configured());
        }
    }

    #[test]
    fn test_build_configured_api_key() {
        let spec = find_tool("fmp").unwrap();
        let credential = ResolvedCredential::ApiKey { value: "k".into() };
        let connector = build_connector(
            spec,
            CredentialKey::new("fmp", "fmp", None),
            &credential,
            &context().with_base_url("fmp", "http://127.0.0.1:9"),
        );
        assert!(connector.is_configured());
    }
}
