//! Financial Modeling Prep market data.

use super::send_json;
use crate::args::Args;
use crate::connector::{not_configured, unknown_operation, Connector};
use async_trait::async_trait;
use reqwest::Client;
use toolgate::{GatewayError, ResolvedCredential, ToolResult};

pub const TOOL_NAME: &str = "fmp";
pub const BASE_URL: &str = "https://financialmodelingprep.com/api/v3";
pub const OPERATIONS: &[&str] = &["quote", "stock_news"];

const DISPLAY_NAME: &str = "FMP";

pub struct FmpConnector {
    api_key: Option<String>,
    http: Client,
    base_url: String,
}

impl FmpConnector {
    pub fn new(credential: &ResolvedCredential, http: Client) -> Self {
        Self {
            api_key: credential.api_key().map(str::to_string),
            http,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point at a different API root (for testing with a mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Real-time quote for one symbol.
    pub async fn quote(&self, symbol: Option<String>) -> ToolResult {
        let Some(api_key) = self.api_key.as_deref() else {
            return not_configured(DISPLAY_NAME);
        };
        let Some(symbol) = symbol.map(|s| s.to_uppercase()) else {
            return GatewayError::Validation("symbol is required".into()).into();
        };

        let url = format!("{}/quote/{}", self.base_url, urlencoding::encode(&symbol));
        let request = self.http.get(&url).query(&[("apikey", api_key)]);

        match send_json(request).await {
            Ok(data) => ToolResult::ok().with("symbol", symbol).with("results", data),
            Err(e) => ToolResult::from(e).with("symbol", symbol),
        }
    }

    /// News for a comma-separated ticker list. `limit` is clamped to 1..=50.
    pub async fn stock_news(&self, tickers: Option<String>, limit: i64) -> ToolResult {
        let Some(api_key) = self.api_key.as_deref() else {
            return not_configured(DISPLAY_NAME);
        };
        let Some(tickers) = tickers else {
            return GatewayError::Validation("tickers is required".into()).into();
        };

        let limit = limit.clamp(1, 50).to_string();
        let request = self
            .http
            .get(format!("{}/stock_news", self.base_url))
            .query(&[
                ("tickers", tickers.as_str()),
                ("limit", limit.as_str()),
                ("apikey", api_key),
            ]);

        match send_json(request).await {
            Ok(data) => ToolResult::ok().with("tickers", tickers).with("results", data),
            Err(e) => ToolResult::from(e).with("tickers", tickers),
        }
    }
}

#[async_trait]
impl Connector for FmpConnector {
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
            "quote" => self.quote(args.text("symbol")).await,
            "stock_news" => {
                self.stock_news(args.text("tickers"), args.integer("limit", 10))
                    .await
            }
            other => unknown_operation(TOOL_NAME, other),
        }
    }
}
