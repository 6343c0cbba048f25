//! Home Assistant REST API.
//!
//! Authenticates with either a long-lived access token or an OAuth2 token set
//! stored for the tenant. OAuth2 tokens are refreshed through the shared
//! [`TokenManager`] before they expire.

pub mod transformer;

use super::send_json;
use crate::args::Args;
use crate::connector::{unknown_operation, Connector};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{Map, Value};
use std::sync::Arc;
use toolgate::credentials::CredentialStore;
use toolgate::token::TokenOptions;
use toolgate::{CredentialKey, GatewayError, ResolvedCredential, TokenManager, ToolResult};
use tracing::debug;

use self::transformer::{service_payload, summarize, EntityState};

pub const TOOL_NAME: &str = "home_assistant";
pub const OPERATIONS: &[&str] = &["list_entities", "get_state", "call_service"];

pub struct HomeAssistantConnector {
    base_url: Option<String>,
    tokens: Option<TokenManager>,
    http: Client,
}

impl HomeAssistantConnector {
    pub fn new(
        key: CredentialKey,
        credential: &ResolvedCredential,
        store: Arc<dyn CredentialStore>,
        http: Client,
        options: TokenOptions,
    ) -> Self {
        let base_url = credential
            .base_url()
            .filter(|url| !url.is_empty())
            .map(str::to_string);
        let tokens = credential
            .oauth2()
            .filter(|auth| auth.has_secret())
            .and_then(|_| TokenManager::for_credential(key, credential, store, http.clone(), options));

        Self {
            base_url,
            tokens,
            http,
        }
    }

    /// Token manager backing this connector, if a token is configured.
    pub fn tokens(&self) -> Option<&TokenManager> {
        self.tokens.as_ref()
    }

    fn ready(&self) -> Result<(&str, &TokenManager), ToolResult> {
        let Some(base_url) = self.base_url.as_deref() else {
            return Err(GatewayError::NotConfigured("Home Assistant base_url missing".into()).into());
        };
        let Some(tokens) = self.tokens.as_ref() else {
            return Err(GatewayError::NotConfigured("Home Assistant token missing".into()).into());
        };
        Ok((base_url, tokens))
    }

    async fn authorized(&self, tokens: &TokenManager, request: RequestBuilder) -> RequestBuilder {
        tokens
            .auth_header()
            .await
            .into_iter()
            .fold(request, |request, (name, value)| request.header(name, value))
    }

    /// All entity states, summarized.
    pub async fn list_entities(&self) -> ToolResult {
        let (base_url, tokens) = match self.ready() {
            Ok(ready) => ready,
            Err(result) => return result,
        };

        let request = self
            .authorized(tokens, self.http.get(format!("{}/api/states", base_url)))
            .await;

        match send_json(request).await {
            Ok(data) => {
                let states: Vec<EntityState> = match serde_json::from_value(data) {
                    Ok(states) => states,
                    Err(e) => {
                        return GatewayError::Transport(format!("unexpected states response: {}", e))
                            .into()
                    }
                };
                let entities: Vec<_> = states.into_iter().map(summarize).collect();
                debug!(count = entities.len(), "Listed Home Assistant entities");
                match serde_json::to_value(entities) {
                    Ok(entities) => ToolResult::ok().with("entities", entities),
                    Err(e) => GatewayError::Transport(e.to_string()).into(),
                }
            }
            Err(e) => e.into(),
        }
    }

    pub async fn get_state(&self, entity_id: Option<String>) -> ToolResult {
        let (base_url, tokens) = match self.ready() {
            Ok(ready) => ready,
            Err(result) => return result,
        };
        let Some(entity_id) = entity_id else {
            return GatewayError::Validation("entity_id is required".into()).into();
        };

        let url = format!(
            "{}/api/states/{}",
            base_url,
            urlencoding::encode(&entity_id)
        );
        let request = self.authorized(tokens, self.http.get(url)).await;

        match send_json(request).await {
            Ok(state) => ToolResult::ok().with("state", state),
            Err(e) => ToolResult::from(e).with("entity_id", entity_id),
        }
    }

    /// Calls `domain.service` (e.g. `light.turn_on`).
    pub async fn call_service(
        &self,
        domain: Option<String>,
        service: Option<String>,
        entity_id: Option<String>,
        service_data: Option<Map<String, Value>>,
    ) -> ToolResult {
        let (base_url, tokens) = match self.ready() {
            Ok(ready) => ready,
            Err(result) => return result,
        };
        let Some(domain) = domain else {
            return GatewayError::Validation("domain is required".into()).into();
        };
        let Some(service) = service else {
            return GatewayError::Validation("service is required".into()).into();
        };

        let url = format!(
            "{}/api/services/{}/{}",
            base_url,
            urlencoding::encode(&domain),
            urlencoding::encode(&service)
        );
        let payload = service_payload(entity_id, service_data);
        let request = self
            .authorized(tokens, self.http.post(url).json(&payload))
            .await;

        match send_json(request).await {
            Ok(result) => ToolResult::ok().with("result", result),
            Err(e) => e.into(),
        }
    }
}

#[async_trait]
impl Connector for HomeAssistantConnector {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn operations(&self) -> &'static [&'static str] {
        OPERATIONS
    }

    fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.tokens.is_some()
    }

    async fn execute(&self, operation: &str, args: &Args) -> ToolResult {
        match operation {
            "list_entities" => self.list_entities().await,
            "get_state" => self.get_state(args.text("entity_id")).await,
            "call_service" => {
                self.call_service(
                    args.text("domain"),
                    args.text("service"),
                    args.text("entity_id"),
                    args.object("service_data"),
                )
                .await
            }
            other => unknown_operation(TOOL_NAME, other),
        }
    }
}
