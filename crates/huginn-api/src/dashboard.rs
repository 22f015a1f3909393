//! Dashboard DTOs. Field names stay camelCase on the wire, matching what
//! the dashboard frontend already consumes.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LightDto {
    pub id: String,
    pub name: String,
    pub is_on: bool,
    pub brightness: Option<u8>,
    pub area: Option<String>,
    pub floor: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlindDto {
    pub id: String,
    pub name: String,
    pub state: String,
    pub current_position: Option<i64>,
    pub area: Option<String>,
    pub floor: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SensorDto {
    pub id: String,
    pub name: String,
    pub state: String,
    pub unit_of_measurement: Option<String>,
    pub device_class: Option<String>,
    pub area: Option<String>,
    pub floor: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeatherDto {
    pub location: String,
    pub temperature: f64,
    pub symbol_code: String,
    pub precipitation_amount: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLightCommand {
    pub is_on: Option<bool>,
    pub brightness: Option<u8>,
    /// RGB triple `[r, g, b]`.
    pub color: Option<Vec<u8>>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct SetBlindPositionCommand {
    pub position: u8,
}
