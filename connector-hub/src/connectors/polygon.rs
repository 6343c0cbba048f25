//! Polygon.io market data.

use super::{field_or, send_json};
use crate::args::Args;
use crate::connector::{not_configured, unknown_operation, Connector};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use toolgate::{GatewayError, ResolvedCredential, ToolResult};

pub const TOOL_NAME: &str = "polygon";
pub const BASE_URL: &str = "https://api.polygon.io";
pub const OPERATIONS: &[&str] = &["prev_close", "ticker_details"];

const DISPLAY_NAME: &str = "Polygon";

pub struct PolygonConnector {
    api_key: Option<String>,
    http: Client,
    base_url: String,
}

impl PolygonConnector {
    pub fn new(credential: &ResolvedCredential, http: Client) -> Self {
        Self {
            api_key: credential.api_key().map(str::to_string),
            http,
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn ready(&self, ticker: Option<String>) -> Result<(&str, String), ToolResult> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(not_configured(DISPLAY_NAME));
        };
        match ticker {
            Some(ticker) => Ok((api_key, ticker.to_uppercase())),
            None => Err(GatewayError::Validation("ticker is required".into()).into()),
        }
    }

    /// Previous trading day aggregate.
    pub async fn prev_close(&self, ticker: Option<String>, adjusted: bool) -> ToolResult {
        let (api_key, ticker) = match self.ready(ticker) {
            Ok(ready) => ready,
            Err(result) => return result,
        };

        let url = format!(
            "{}/v2/aggs/ticker/{}/prev",
            self.base_url,
            urlencoding::encode(&ticker)
        );
        let adjusted = if adjusted { "true" } else { "false" };
        let request = self
            .http
            .get(&url)
            .query(&[("adjusted", adjusted), ("apiKey", api_key)]);

        match send_json(request).await {
            Ok(data) => ToolResult::ok()
                .with("ticker", ticker)
                .with("results", field_or(&data, "results", json!([]))),
            Err(e) => ToolResult::from(e).with("ticker", ticker),
        }
    }

    /// Reference data for a ticker.
    pub async fn ticker_details(&self, ticker: Option<String>) -> ToolResult {
        let (api_key, ticker) = match self.ready(ticker) {
            Ok(ready) => ready,
            Err(result) => return result,
        };

        let url = format!(
            "{}/v3/reference/tickers/{}",
            self.base_url,
            urlencoding::encode(&ticker)
        );
        let request = self.http.get(&url).query(&[("apiKey", api_key)]);

        match send_json(request).await {
            Ok(data) => ToolResult::ok()
                .with("ticker", ticker)
                .with("result", field_or(&data, "results", json!({}))),
            Err(e) => ToolResult::from(e).with("ticker", ticker),
        }
    }
}

#[async_trait]
impl Connector for PolygonConnector {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn operations(&self) -> &'static [&'static str] {
        OPERATIONS
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn execute(&self, operation: &str, args: &Args) -> ToolResult {
        match operation {
            "prev_close" => {
                self.prev_close(args.text("ticker"), args.boolean("adjusted", true))
                    .await
            }
            "ticker_details" => self.ticker_details(args.text("ticker")).await,
            other => unknown_operation(TOOL_NAME, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn connector(server: &mockito::Server) -> PolygonConnector {
        let credential = ResolvedCredential::ApiKey {
            value: "poly-key".into(),
        };
        PolygonConnector::new(&credential, Client::new()).with_base_url(server.url())
    }

    #[tokio::test]
    async fn test_prev_close() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/aggs/ticker/TSLA/prev")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("adjusted".into(), "false".into()),
                Matcher::UrlEncoded("apiKey".into(), "poly-key".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ticker":"TSLA","results":[{"c":250.1}]}"#)
            .create_async()
            .await;

        let result = connector(&server)
            .execute(
                "prev_close",
                &Args::from(json!({"ticker": "tsla", "adjusted": false})),
            )
            .await;

        assert!(result.success);
        assert_eq!(result.get("ticker"), Some(&json!("TSLA")));
        assert_eq!(result.get("results"), Some(&json!([{"c": 250.1}])));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_ticker_details_defaults_missing_results() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v3/reference/tickers/NVDA")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"OK"}"#)
            .create_async()
            .await;

        let result = connector(&server).ticker_details(Some("nvda".into())).await;

        assert!(result.success);
        assert_eq!(result.get("result"), Some(&json!({})));
    }

    #[tokio::test]
    async fn test_missing_ticker() {
        let server = mockito::Server::new_async().await;
        let result = connector(&server)
            .execute("ticker_details", &Args::from(json!({"ticker": "  "})))
            .await;
        assert_eq!(result.error.as_deref(), Some("ticker is required"));
    }

    #[tokio::test]
    async fn test_upstream_failure_echoes_ticker() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v2/aggs/ticker/AMD/prev")
            .match_query(Matcher::Any)
            .with_status(403)
            .create_async()
            .await;

        let result = connector(&server).prev_close(Some("amd".into()), true).await;
        assert!(!result.success);
        assert_eq!(result.get("ticker"), Some(&json!("AMD")));
    }

    #[tokio::test]
    async fn test_unconfigured_checked_first() {
        let c = PolygonConnector::new(&ResolvedCredential::Unconfigured, Client::new());
        let result = c.prev_close(None, true).await;
        assert_eq!(
            result.error.as_deref(),
            Some("Polygon connector not configured (missing API key)")
        );
    }
}
