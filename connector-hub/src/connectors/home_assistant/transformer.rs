use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw entry from `GET /api/states`.
#[derive(Debug, Deserialize)]
pub struct EntityState {
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub state: Value,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// Compact entity listing returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySummary {
    pub entity_id: Option<String>,
    pub state: Value,
    /// `friendly_name`, falling back to the entity id
    pub name: Option<String>,
    /// Prefix of the entity id (`light.kitchen` → `light`)
    pub domain: Option<String>,
}

pub fn summarize(entity: EntityState) -> EntitySummary {
    let name = entity
        .attributes
        .get("friendly_name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .or_else(|| entity.entity_id.clone());
    let domain = entity
        .entity_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .and_then(|id| id.split('.').next())
        .map(str::to_string);

    EntitySummary {
        entity_id: entity.entity_id,
        state: entity.state,
        name,
        domain,
    }
}

/// Service payload: `service_data` plus `entity_id` unless already present.
pub fn service_payload(entity_id: Option<String>, service_data: Option<Map<String, Value>>) -> Value {
    let mut payload = service_data.unwrap_or_default();
    if let Some(entity_id) = entity_id {
        payload
            .entry("entity_id")
            .or_insert(Value::String(entity_id));
    }
    Value::Object(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(value: Value) -> EntityState {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_summarize_uses_friendly_name() {
        let summary = summarize(entity(json!({
            "entity_id": "light.kitchen",
            "state": "on",
            "attributes": {"friendly_name": "Kitchen Light", "brightness": 200}
        })));

        assert_eq!(
            summary,
            EntitySummary {
                entity_id: Some("light.kitchen".into()),
                state: json!("on"),
                name: Some("Kitchen Light".into()),
                domain: Some("light".into()),
            }
        );
    }

    #[test]
    fn test_summarize_falls_back_to_entity_id() {
        let summary = summarize(entity(json!({"entity_id": "sensor.temp", "state": "21.5"})));
        assert_eq!(summary.name.as_deref(), Some("sensor.temp"));
        assert_eq!(summary.domain.as_deref(), Some("sensor"));

        let anonymous = summarize(entity(json!({"state": "unknown"})));
        assert_eq!(anonymous.name, None);
        assert_eq!(anonymous.domain, None);
    }

    #[test]
    fn test_service_payload_keeps_explicit_entity() {
        let payload = service_payload(
            Some("light.hall".into()),
            Some(json!({"entity_id": "light.porch", "brightness": 10}).as_object().unwrap().clone()),
        );
        assert_eq!(payload, json!({"entity_id": "light.porch", "brightness": 10}));

        let added = service_payload(Some("light.hall".into()), None);
        assert_eq!(added, json!({"entity_id": "light.hall"}));

        assert_eq!(service_payload(None, None), json!({}));
    }
}
