use camino::Utf8Path;
use config::{Config, ConfigError};

pub use huginn_api::config::*;

pub fn parse(filename: &Utf8Path) -> Result<AppConfig, ConfigError> {
    let settings = Config::builder()
        .set_default("server.listen_address", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default(
            "weather.url",
            "https://api.met.no/weatherapi/locationforecast/2.0",
        )?
        .set_default("weather.user_agent", "huginn/0.1 github.com/vegardlu/huginn")?
        .set_default("weather.cache_minutes", 30)?
        .set_default("llm.model", "gemini-2.0-flash")?
        .set_default(
            "llm.base_url",
            "https://generativelanguage.googleapis.com/v1beta/openai",
        )?
        .set_default("llm.max_tokens", 1024)?
        .set_default("llm.temperature", 0.7)?
        .add_source(config::File::with_name(filename.as_str()))
        .build()?;

    settings.try_deserialize()
}
