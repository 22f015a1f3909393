use std::sync::Arc;

use futures::FutureExt;
use serde_json::{Map, Value, json};

use crate::backend::hass::cache::EntityCache;
use crate::backend::hass::client::HubApi;
use crate::error::ApiResult;
use crate::llm::ToolDefinition;
use crate::model::EnhancedEntityState;
use crate::tools::{ToolRegistry, arg_str};

/// Home Assistant tools as a language model consumes them: plain
/// line-oriented text in, plain text out. Reads come from the entity
/// cache; only `call_service` touches the hub.
pub struct HomeTools {
    cache: Arc<EntityCache>,
    hub: Arc<dyn HubApi>,
}

impl HomeTools {
    #[must_use]
    pub fn new(cache: Arc<EntityCache>, hub: Arc<dyn HubApi>) -> Self {
        Self { cache, hub }
    }

    pub fn list_areas(&self) -> String {
        self.cache.areas().join("\n")
    }

    /// `entity_id|friendly_name|area|floor|state|device_class|unit` lines.
    ///
    /// When a filter matches nothing, the complete unfiltered list is
    /// returned behind an explanatory notice so the model can do its own
    /// fuzzy matching instead of dead-ending on an empty result.
    pub fn list_entities(&self, domain: Option<&str>, area: Option<&str>) -> String {
        let filtered = self.entity_lines(domain, area);

        if filtered.is_empty() && (domain.is_some() || area.is_some()) {
            let all = self.entity_lines(None, None);
            return format!(
                "No entities found with filter [domain={}, area={}]. Here is the COMPLETE list of entities. Please check this list to find what the user meant:\n{}",
                domain.unwrap_or("null"),
                area.unwrap_or("null"),
                all.join("\n")
            );
        }

        filtered.join("\n")
    }

    fn entity_lines(&self, domain: Option<&str>, area: Option<&str>) -> Vec<String> {
        self.cache
            .filter(domain, area)
            .iter()
            .map(entity_line)
            .collect()
    }

    pub fn get_state(&self, entity_id: &str) -> String {
        if entity_id.trim().is_empty() {
            return "Error: entity_id is required".to_string();
        }
        match self.cache.get(entity_id) {
            Some(entity) => json!({
                "state": entity.state,
                "attributes": entity.attributes,
            })
            .to_string(),
            None => "Entity not found".to_string(),
        }
    }

    pub async fn call_service(
        &self,
        domain: &str,
        service: &str,
        entity_id: &str,
        payload_json: &str,
    ) -> ApiResult<String> {
        let payload = parse_payload(payload_json);
        self.hub
            .invoke_service(domain, service, entity_id, payload)
            .await?;
        Ok(format!("Service {domain}.{service} called for {entity_id}"))
    }
}

fn entity_line(entity: &EnhancedEntityState) -> String {
    let device_class = entity.attr_str("device_class").unwrap_or("");
    let unit = entity.attr_str("unit_of_measurement").unwrap_or("");
    format!(
        "{}|{}|{}|{}|{}|{}|{}",
        entity.entity_id,
        entity.friendly_name,
        entity.area.as_deref().unwrap_or("None"),
        entity.floor.as_deref().unwrap_or("None"),
        entity.state,
        device_class,
        unit
    )
}

/// Lenient payload parse: blank, malformed or non-object JSON all become
/// an empty payload rather than an error.
fn parse_payload(payload_json: &str) -> Map<String, Value> {
    if payload_json.trim().is_empty() {
        return Map::new();
    }
    serde_json::from_str::<Value>(payload_json)
        .ok()
        .and_then(|v| v.as_object().cloned())
        .unwrap_or_default()
}

/// Register the four home tools with their argument schemas.
pub fn register_home_tools(registry: &mut ToolRegistry, tools: Arc<HomeTools>) {
    let facade = tools.clone();
    registry.register(
        ToolDefinition {
            name: "list_areas".to_string(),
            description: "List all configured areas (rooms) in the home.".to_string(),
            input_schema: json!({"type": "object", "properties": {}}),
        },
        move |_args| {
            let facade = facade.clone();
            async move { Ok(facade.list_areas()) }.boxed()
        },
    );

    let facade = tools.clone();
    registry.register(
        ToolDefinition {
            name: "list_entities".to_string(),
            description: "List entities. If you filter by area/domain and nothing is found, I will return ALL entities so you can find it yourself.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "domain": {
                        "type": "string",
                        "description": "Optional domain filter."
                    },
                    "area": {
                        "type": "string",
                        "description": "Optional area filter."
                    }
                }
            }),
        },
        move |args| {
            let facade = facade.clone();
            async move {
                let domain = arg_str(&args, "domain");
                let area = arg_str(&args, "area");
                Ok(facade.list_entities(domain.as_deref(), area.as_deref()))
            }
            .boxed()
        },
    );

    let facade = tools.clone();
    registry.register(
        ToolDefinition {
            name: "get_state".to_string(),
            description: "Get the current state and attributes of a specific entity.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "entity_id": {
                        "type": "string",
                        "description": "The entity ID (e.g., 'light.kitchen_lights')."
                    }
                },
                "required": ["entity_id"]
            }),
        },
        move |args| {
            let facade = facade.clone();
            async move {
                let entity_id = arg_str(&args, "entity_id").unwrap_or_default();
                Ok(facade.get_state(&entity_id))
            }
            .boxed()
        },
    );

    let facade = tools;
    registry.register(
        ToolDefinition {
            name: "call_service".to_string(),
            description: "Call a service on a home assistant domain to control devices (e.g., turn light on/off).".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "domain": {
                        "type": "string",
                        "description": "The domain (e.g., 'light')."
                    },
                    "service": {
                        "type": "string",
                        "description": "The service to call (e.g., 'turn_on', 'turn_off')."
                    },
                    "entity_id": {
                        "type": "string",
                        "description": "The entity ID to target."
                    },
                    "payload_json": {
                        "type": "string",
                        "description": "Optional JSON string for additional parameters like brightness, color, etc."
                    }
                },
                "required": ["domain", "service", "entity_id"]
            }),
        },
        move |args| {
            let facade = facade.clone();
            async move {
                let domain = arg_str(&args, "domain").unwrap_or_default();
                let service = arg_str(&args, "service").unwrap_or_default();
                let entity_id = arg_str(&args, "entity_id").unwrap_or_default();
                let payload_json = arg_str(&args, "payload_json").unwrap_or_default();
                facade
                    .call_service(&domain, &service, &entity_id, &payload_json)
                    .await
            }
            .boxed()
        },
    );
}
