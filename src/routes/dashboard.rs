use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use serde_json::{Map, Value, json};

use huginn_api::dashboard::{
    BlindDto, LightDto, SensorDto, SetBlindPositionCommand, UpdateLightCommand, WeatherDto,
};

use crate::model::EnhancedEntityState;
use crate::routes::RouteResult;
use crate::server::appstate::AppState;

// Dashboard reads come from the entity cache; commands go straight to
// the hub. A command's effect shows up in reads after the next poll.

fn light_dto(entity: &EnhancedEntityState) -> LightDto {
    let brightness = entity
        .attributes
        .get("brightness")
        .and_then(Value::as_u64)
        .and_then(|b| u8::try_from(b).ok());

    LightDto {
        id: entity.entity_id.clone(),
        name: entity.friendly_name.clone(),
        is_on: entity.state.eq_ignore_ascii_case("on"),
        brightness,
        area: entity.area.clone(),
        floor: entity.floor.clone(),
    }
}

fn blind_dto(entity: &EnhancedEntityState) -> BlindDto {
    BlindDto {
        id: entity.entity_id.clone(),
        name: entity.friendly_name.clone(),
        state: entity.state.clone(),
        current_position: entity.attributes.get("current_position").and_then(Value::as_i64),
        area: entity.area.clone(),
        floor: entity.floor.clone(),
    }
}

fn sensor_dto(entity: &EnhancedEntityState) -> SensorDto {
    SensorDto {
        id: entity.entity_id.clone(),
        name: entity.friendly_name.clone(),
        state: entity.state.clone(),
        unit_of_measurement: entity.attr_str("unit_of_measurement").map(ToString::to_string),
        device_class: entity.attr_str("device_class").map(ToString::to_string),
        area: entity.area.clone(),
        floor: entity.floor.clone(),
    }
}

/// Noise filter for the sensor list: timestamp-ish sensors, phone
/// companion-app sensors, backup managers and unavailable entities add
/// nothing to a wall dashboard.
fn is_dashboard_sensor(entity: &EnhancedEntityState) -> bool {
    let device_class = entity.attr_str("device_class").unwrap_or("");
    if device_class == "timestamp" || device_class == "date" {
        return false;
    }

    let name = entity.friendly_name.to_lowercase();
    if name.contains("iphone") || name.contains("phone") || name.contains("pixel") {
        return false;
    }

    if entity.entity_id.to_lowercase().contains("backup") {
        return false;
    }

    if entity.state == "unavailable" || entity.state == "unknown" {
        return false;
    }

    // ISO8601-shaped states are timestamps regardless of device_class.
    if looks_like_date(&entity.state) {
        return false;
    }

    true
}

fn looks_like_date(state: &str) -> bool {
    let bytes = state.as_bytes();
    bytes.len() >= 10
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..7].iter().all(u8::is_ascii_digit)
        && bytes[7] == b'-'
        && bytes[8..10].iter().all(u8::is_ascii_digit)
}

async fn get_lights(State(state): State<AppState>) -> Json<Vec<LightDto>> {
    let lights = state
        .cache()
        .filter(Some("light"), None)
        .iter()
        .map(light_dto)
        .collect();
    Json(lights)
}

async fn get_blinds(State(state): State<AppState>) -> Json<Vec<BlindDto>> {
    let blinds = state
        .cache()
        .filter(Some("cover"), None)
        .iter()
        .map(blind_dto)
        .collect();
    Json(blinds)
}

async fn get_sensors(State(state): State<AppState>) -> Json<Vec<SensorDto>> {
    let sensors = state
        .cache()
        .filter(Some("sensor"), None)
        .iter()
        .filter(|e| is_dashboard_sensor(e))
        .map(sensor_dto)
        .collect();
    Json(sensors)
}

async fn get_weather(State(state): State<AppState>) -> Json<Vec<WeatherDto>> {
    Json(state.weather().weather().await)
}

async fn toggle_light(State(state): State<AppState>, Path(id): Path<String>) -> RouteResult<()> {
    state
        .hub()
        .invoke_service("light", "toggle", &id, Map::new())
        .await?;
    Ok(())
}

async fn update_light(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(cmd): Json<UpdateLightCommand>,
) -> RouteResult<()> {
    let hub = state.hub();

    if cmd.is_on == Some(false) {
        hub.invoke_service("light", "turn_off", &id, Map::new()).await?;
        return Ok(());
    }

    // Adjusting brightness or color implies turning on.
    let mut data = Map::new();
    if let Some(brightness) = cmd.brightness {
        data.insert("brightness".to_string(), json!(brightness));
    }
    if let Some(color) = &cmd.color {
        data.insert("rgb_color".to_string(), json!(color));
    }

    if !data.is_empty() || cmd.is_on == Some(true) {
        hub.invoke_service("light", "turn_on", &id, data).await?;
    }
    Ok(())
}

async fn set_blind_position(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(cmd): Json<SetBlindPositionCommand>,
) -> RouteResult<()> {
    let mut data = Map::new();
    data.insert("position".to_string(), json!(cmd.position));
    state
        .hub()
        .invoke_service("cover", "set_cover_position", &id, data)
        .await?;
    Ok(())
}

async fn open_blind(State(state): State<AppState>, Path(id): Path<String>) -> RouteResult<()> {
    state
        .hub()
        .invoke_service("cover", "open_cover", &id, Map::new())
        .await?;
    Ok(())
}

async fn close_blind(State(state): State<AppState>, Path(id): Path<String>) -> RouteResult<()> {
    state
        .hub()
        .invoke_service("cover", "close_cover", &id, Map::new())
        .await?;
    Ok(())
}

async fn stop_blind(State(state): State<AppState>, Path(id): Path<String>) -> RouteResult<()> {
    state
        .hub()
        .invoke_service("cover", "stop_cover", &id, Map::new())
        .await?;
    Ok(())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/lights", get(get_lights))
        .route("/weather", get(get_weather))
        .route("/sensors", get(get_sensors))
        .route("/blinds", get(get_blinds))
        .route("/lights/{id}/toggle", post(toggle_light))
        .route("/lights/{id}/state", post(update_light))
        .route("/blinds/{id}/position", post(set_blind_position))
        .route("/blinds/{id}/open", post(open_blind))
        .route("/blinds/{id}/close", post(close_blind))
        .route("/blinds/{id}/stop", post(stop_blind))
}
