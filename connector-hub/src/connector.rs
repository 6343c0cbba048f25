use crate::args::Args;
use async_trait::async_trait;
use toolgate::{GatewayError, ToolResult};

/// Tool connector interface.
///
/// A connector is built per `(tool, credential id, tenant)` with its
/// credential already resolved. Store-backed connectors are then shared by
/// every request for that key.
/// Operations never fail with an `Err`: every outcome, including missing
/// configuration and upstream errors, is a [`ToolResult`].
///
/// # Example
/// ```no_run
/// use async_trait::async_trait;
/// use connector_hub::{unknown_operation, Args, Connector};
/// use toolgate::ToolResult;
///
/// struct EchoConnector;
///
/// #[async_trait]
/// impl Connector for EchoConnector {
///     fn name(&self) -> &str {
///         "echo"
///     }
///
///     fn operations(&self) -> &'static [&'static str] {
///         &["say"]
///     }
///
///     fn is_configured(&self) -> bool {
///         true
///     }
///
///     async fn execute(&self, operation: &str, args: &Args) -> ToolResult {
///         match operation {
///             "say" => match args.required("text") {
///                 Ok(text) => ToolResult::ok().with("text", text),
///                 Err(e) => e.into(),
///             },
///             other => unknown_operation(self.name(), other),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Connector: Send + Sync {
    /// Tool name (e.g. "fmp", "home_assistant"). Used in routes and logs.
    fn name(&self) -> &str;

    /// Operation names accepted by [`Connector::execute`].
    fn operations(&self) -> &'static [&'static str];

    /// True when a usable credential was resolved at construction.
    fn is_configured(&self) -> bool;

    /// Runs one operation.
    async fn execute(&self, operation: &str, args: &Args) -> ToolResult;
}

/// Failure for an operation name the connector does not support.
pub fn unknown_operation(tool: &str, operation: &str) -> ToolResult {
    GatewayError::Validation(format!("unknown operation '{}' for {}", operation, tool)).into()
}

/// Failure for an API-key connector built without a key.
pub fn not_configured(display_name: &str) -> ToolResult {
    GatewayError::NotConfigured(format!(
        "{} connector not configured (missing API key)",
        display_name
    ))
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_messages() {
        let unknown = unknown_operation("fmp", "delete_everything");
        assert!(!unknown.success);
        assert_eq!(
            unknown.error.as_deref(),
            Some("unknown operation 'delete_everything' for fmp")
        );

        let missing = not_configured("Polygon");
        assert_eq!(
            missing.error.as_deref(),
            Some("Polygon connector not configured (missing API key)")
        );
    }
}
