use std::net::Ipv4Addr;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct ServerConfig {
    pub listen_address: Ipv4Addr,
    pub port: u16,
}

/// Connection settings for the Home Assistant instance.
///
/// The access token is never stored in the config file; `token_env` names
/// the environment variable holding it (default `HASS_TOKEN`).
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct HubConfig {
    pub url: Url,
    pub token_env: Option<String>,
    pub poll_interval_secs: Option<NonZeroU32>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LocationConfig {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WeatherConfig {
    pub url: Url,
    pub user_agent: String,
    pub cache_minutes: u32,
    #[serde(default = "default_locations")]
    pub locations: Vec<LocationConfig>,
}

/// Settings for the chat model behind the assistant. The endpoint is any
/// OpenAI-compatible chat-completions API; the key comes from the
/// environment variable named by `api_key_env`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: Url,
    pub api_key_env: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub hub: HubConfig,
    pub weather: WeatherConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

fn default_locations() -> Vec<LocationConfig> {
    vec![
        LocationConfig {
            name: "Fyrstikkalléen 1".to_string(),
            lat: 59.9139,
            lon: 10.7952,
        },
        LocationConfig {
            name: "Vidjeveien 4a".to_string(),
            lat: 59.8880,
            lon: 10.8037,
        },
    ]
}

impl HubConfig {
    pub const DEFAULT_TOKEN_ENV: &'static str = "HASS_TOKEN";
    pub const DEFAULT_POLL_INTERVAL_SECS: u32 = 5;

    #[must_use]
    pub fn token_env_name(&self) -> &str {
        self.token_env.as_deref().unwrap_or(Self::DEFAULT_TOKEN_ENV)
    }

    #[must_use]
    pub fn poll_interval_secs(&self) -> u32 {
        self.poll_interval_secs
            .map_or(Self::DEFAULT_POLL_INTERVAL_SECS, NonZeroU32::get)
    }
}

impl LlmConfig {
    pub const DEFAULT_API_KEY_ENV: &'static str = "HUGINN_LLM_API_KEY";

    #[must_use]
    pub fn api_key_env_name(&self) -> &str {
        self.api_key_env
            .as_deref()
            .unwrap_or(Self::DEFAULT_API_KEY_ENV)
    }
}
