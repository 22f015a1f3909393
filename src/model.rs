use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw entity state as returned by `GET /api/states`.
#[derive(Clone, Debug, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// Entity state enriched with area and floor resolution.
///
/// `area_id`/`area`/`floor` are `None` when the hub has no assignment; the
/// literal strings `"None"` and `"unknown"` emitted by the template engine
/// are normalized away before they reach this struct.
#[derive(Clone, Debug, Serialize)]
pub struct EnhancedEntityState {
    pub entity_id: String,
    pub friendly_name: String,
    pub area_id: Option<String>,
    pub area: Option<String>,
    pub floor: Option<String>,
    pub state: String,
    pub attributes: Map<String, Value>,
}

impl EnhancedEntityState {
    /// Map a raw state without area information (the bootstrap/fallback
    /// path, where only `/api/states` data is available).
    #[must_use]
    pub fn from_state(state: EntityState) -> Self {
        let friendly_name = state
            .attributes
            .get("friendly_name")
            .and_then(Value::as_str)
            .map_or_else(|| state.entity_id.clone(), ToString::to_string);

        Self {
            entity_id: state.entity_id,
            friendly_name,
            area_id: None,
            area: None,
            floor: None,
            state: state.state,
            attributes: state.attributes,
        }
    }

    /// String attribute lookup (e.g. `device_class`, `unit_of_measurement`).
    #[must_use]
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }
}

/// Drop the template engine's textual nulls: `"None"`, `"unknown"` and
/// empty strings all mean "no value".
#[must_use]
pub fn scrub_template_field(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value == "None" || value == "unknown" {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_state_defaults_friendly_name_to_entity_id() {
        let raw = EntityState {
            entity_id: "light.kitchen".to_string(),
            state: "on".to_string(),
            attributes: Map::new(),
        };
        let enhanced = EnhancedEntityState::from_state(raw);
        assert_eq!(enhanced.friendly_name, "light.kitchen");
        assert_eq!(enhanced.area, None);
        assert_eq!(enhanced.floor, None);
    }

    #[test]
    fn from_state_uses_friendly_name_attribute() {
        let mut attributes = Map::new();
        attributes.insert("friendly_name".to_string(), json!("Kitchen Light"));
        let raw = EntityState {
            entity_id: "light.kitchen".to_string(),
            state: "on".to_string(),
            attributes,
        };
        assert_eq!(
            EnhancedEntityState::from_state(raw).friendly_name,
            "Kitchen Light"
        );
    }

    #[test]
    fn scrub_drops_textual_nulls() {
        assert_eq!(scrub_template_field("None"), None);
        assert_eq!(scrub_template_field("unknown"), None);
        assert_eq!(scrub_template_field("  "), None);
        assert_eq!(
            scrub_template_field("Living Room"),
            Some("Living Room".to_string())
        );
    }
}
