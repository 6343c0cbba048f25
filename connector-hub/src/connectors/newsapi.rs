//! NewsAPI search and headlines.

use super::{field_or, send_json};
use crate::args::Args;
use crate::connector::{not_configured, unknown_operation, Connector};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use toolgate::{GatewayError, ResolvedCredential, ToolResult};

pub const TOOL_NAME: &str = "newsapi";
pub const BASE_URL: &str = "https://newsapi.org/v2";
pub const OPERATIONS: &[&str] = &["search", "top_headlines"];

const DISPLAY_NAME: &str = "NewsAPI";
const DEFAULT_PAGE_SIZE: i64 = 20;

/// Parameters for `/everything`.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub language: String,
    pub sort_by: String,
    pub page_size: i64,
}

impl SearchQuery {
    fn from_args(args: &Args) -> Self {
        Self {
            q: args.text("q"),
            language: args.text_or("language", "en"),
            sort_by: args.text_or("sort_by", "publishedAt"),
            page_size: args.integer("page_size", DEFAULT_PAGE_SIZE),
        }
    }
}

/// Parameters for `/top-headlines`.
#[derive(Debug, Clone)]
pub struct HeadlinesQuery {
    pub country: String,
    pub category: Option<String>,
    pub q: Option<String>,
    pub page_size: i64,
}

impl HeadlinesQuery {
    fn from_args(args: &Args) -> Self {
        Self {
            country: args.text_or("country", "us"),
            category: args.text("category"),
            q: args.text("q"),
            page_size: args.integer("page_size", DEFAULT_PAGE_SIZE),
        }
    }
}

pub struct NewsApiConnector {
    api_key: Option<String>,
    http: Client,
    base_url: String,
}

impl NewsApiConnector {
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

    pub async fn search(&self, query: SearchQuery) -> ToolResult {
        let Some(api_key) = self.api_key.as_deref() else {
            return not_configured(DISPLAY_NAME);
        };
        let Some(q) = query.q else {
            return GatewayError::Validation("q is required".into()).into();
        };

        let page_size = clamp_page_size(query.page_size);
        let request = self
            .http
            .get(format!("{}/everything", self.base_url))
            .query(&[
                ("q", q.as_str()),
                ("language", query.language.as_str()),
                ("sortBy", query.sort_by.as_str()),
                ("pageSize", page_size.as_str()),
                ("apiKey", api_key),
            ]);

        match send_json(request).await {
            Ok(data) => ToolResult::ok()
                .with("query", q)
                .with("results", field_or(&data, "articles", json!([]))),
            Err(e) => ToolResult::from(e).with("query", q),
        }
    }

    pub async fn top_headlines(&self, query: HeadlinesQuery) -> ToolResult {
        let Some(api_key) = self.api_key.as_deref() else {
            return not_configured(DISPLAY_NAME);
        };

        let page_size = clamp_page_size(query.page_size);
        let mut params = vec![
            ("country", query.country.as_str()),
            ("pageSize", page_size.as_str()),
            ("apiKey", api_key),
        ];
        if let Some(category) = query.category.as_deref() {
            params.push(("category", category));
        }
        if let Some(q) = query.q.as_deref() {
            params.push(("q", q));
        }

        let request = self
            .http
            .get(format!("{}/top-headlines", self.base_url))
            .query(&params);

        match send_json(request).await {
            Ok(data) => ToolResult::ok().with("results", field_or(&data, "articles", json!([]))),
            Err(e) => e.into(),
        }
    }
}

fn clamp_page_size(page_size: i64) -> String {
    page_size.clamp(1, 100).to_string()
}

#[async_trait]
impl Connector for NewsApiConnector {
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
            "search" => self.search(SearchQuery::from_args(args)).await,
            "top_headlines" => self.top_headlines(HeadlinesQuery::from_args(args)).await,
            other => unknown_operation(TOOL_NAME, other),
        }
    }
}
