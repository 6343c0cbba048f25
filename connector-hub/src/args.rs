//! Typed access to the JSON arguments of an execute request.

use serde_json::{Map, Value};
use toolgate::GatewayError;

/// Operation arguments (`{"symbol": "aapl", "limit": 5}`).
///
/// Lookups are lenient the way callers expect: numbers may arrive as
/// strings, and blank strings count as absent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Args(Map<String, Value>);

impl Args {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Trimmed, non-empty string argument. Numbers are rendered as text.
    pub fn text(&self, name: &str) -> Option<String> {
        let value = match self.0.get(name)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        (!value.is_empty()).then_some(value)
    }

    /// Like [`Args::text`], failing with `"<name> is required"`.
    pub fn required(&self, name: &str) -> Result<String, GatewayError> {
        self.text(name)
            .ok_or_else(|| GatewayError::Validation(format!("{} is required", name)))
    }

    pub fn text_or(&self, name: &str, default: &str) -> String {
        self.text(name).unwrap_or_else(|| default.to_string())
    }

    /// Integer argument; missing, zero or unparseable values use `default`.
    pub fn integer(&self, name: &str, default: i64) -> i64 {
        let parsed = match self.0.get(name) {
            Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };
        parsed.filter(|n| *n != 0).unwrap_or(default)
    }

    pub fn float(&self, name: &str, default: f64) -> f64 {
        match self.0.get(name) {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(default),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    pub fn boolean(&self, name: &str, default: bool) -> bool {
        match self.0.get(name) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => default,
            },
            _ => default,
        }
    }

    pub fn object(&self, name: &str) -> Option<Map<String, Value>> {
        match self.0.get(name)? {
            Value::Object(map) => Some(map.clone()),
            _ => None,
        }
    }
}

impl From<Map<String, Value>> for Args {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Value> for Args {
    /// Non-object values carry no arguments.
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Args {
        Args::from(value)
    }

    #[test]
    fn test_text_trims_and_drops_blank() {
        let a = args(json!({"symbol": "  aapl ", "blank": "   ", "n": 42, "flag": true}));
        assert_eq!(a.text("symbol").as_deref(), Some("aapl"));
        assert_eq!(a.text("blank"), None);
        assert_eq!(a.text("n").as_deref(), Some("42"));
        assert_eq!(a.text("flag"), None);
        assert_eq!(a.text("missing"), None);
    }

    #[test]
    fn test_required_message() {
        let err = args(json!({"symbol": ""})).required("symbol").unwrap_err();
        assert_eq!(err, GatewayError::Validation("symbol is required".into()));
        assert_eq!(err.to_string(), "symbol is required");
    }

    #[test]
    fn test_integer_parsing() {
        let a = args(json!({"a": 5, "b": "7", "c": 0, "d": "x", "e": 3.9}));
        assert_eq!(a.integer("a", 10), 5);
        assert_eq!(a.integer("b", 10), 7);
        assert_eq!(a.integer("c", 10), 10);
        assert_eq!(a.integer("d", 10), 10);
        assert_eq!(a.integer("e", 10), 3);
        assert_eq!(a.integer("missing", 10), 10);
    }

    #[test]
    fn test_boolean_and_float() {
        let a = args(json!({"t": "false", "u": true, "rate": "1.25", "pitch": -2.0}));
        assert!(!a.boolean("t", true));
        assert!(a.boolean("u", false));
        assert!(a.boolean("missing", true));
        assert_eq!(a.float("rate", 1.0), 1.25);
        assert_eq!(a.float("pitch", 0.0), -2.0);
        assert_eq!(a.float("missing", 1.0), 1.0);
    }

    #[test]
    fn test_non_object_is_empty() {
        assert_eq!(args(json!(["a"])), Args::default());
        assert_eq!(args(Value::Null), Args::default());
    }
}
