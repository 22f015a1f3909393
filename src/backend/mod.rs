pub mod hass;
pub mod yr;
