//! Uniform result envelope returned by every connector operation.
//!
//! Serializes flat: `{"success": bool, "error": "..."?, ...data}`.

use crate::error::GatewayError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl ToolResult {
    /// Successful result with no data fields yet.
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            data: Map::new(),
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            data: Map::new(),
        }
    }

    /// Adds a data field. `success` and `error` are reserved and ignored here.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        if field != "success" && field != "error" {
            self.data.insert(field.to_string(), value.into());
        }
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }
}

impl From<GatewayError> for ToolResult {
    fn from(e: GatewayError) -> Self {
        ToolResult::fail(e.to_string())
    }
}
