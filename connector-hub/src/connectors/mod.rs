pub mod fmp;
pub mod gemini;
pub mod home_assistant;
pub mod newsapi;
pub mod polygon;

use reqwest::RequestBuilder;
use serde_json::Value;
use toolgate::GatewayError;

pub use fmp::FmpConnector;
pub use gemini::GeminiConnector;
pub use home_assistant::HomeAssistantConnector;
pub use newsapi::NewsApiConnector;
pub use polygon::PolygonConnector;

/// Sends a request and decodes a JSON body.
///
/// Connection errors, timeouts, non-2xx statuses and undecodable bodies all
/// become [`GatewayError::Transport`].
pub(crate) async fn send_json(request: RequestBuilder) -> Result<Value, GatewayError> {
    let response = request.send().await?.error_for_status()?;
    Ok(response.json::<Value>().await?)
}

/// `value[field]`, or `default` when absent or null.
pub(crate) fn field_or(value: &Value, field: &str, default: Value) -> Value {
    match value.get(field) {
        Some(Value::Null) | None => default,
        Some(v) => v.clone(),
    }
}
