use std::sync::Arc;

use huginn_api::config::AppConfig;

use crate::backend::hass::cache::EntityCache;
use crate::backend::hass::client::{HassClient, HubApi};
use crate::backend::yr::YrClient;
use crate::chat::ChatManager;
use crate::db::UserStore;
use crate::error::ApiResult;
use crate::llm::LlmProvider;
use crate::llm::http::HttpProvider;
use crate::tools::ToolRegistry;
use crate::tools::facade::{HomeTools, register_home_tools};
use crate::weather::WeatherService;

#[derive(Clone)]
pub struct AppState {
    conf: Arc<AppConfig>,
    hub: Arc<dyn HubApi>,
    cache: Arc<EntityCache>,
    weather: Arc<WeatherService>,
    registry: Arc<ToolRegistry>,
    chat: Arc<ChatManager>,
    users: Option<Arc<UserStore>>,
}

impl AppState {
    /// Wire up all components and run the synchronous bootstrap refresh so
    /// the first requests are not served from an empty cache when the hub
    /// is reachable.
    pub async fn from_config(config: AppConfig) -> ApiResult<Self> {
        let hub: Arc<dyn HubApi> = Arc::new(HassClient::new(&config.hub)?);
        let cache = Arc::new(EntityCache::new(hub.clone()));

        log::info!("Priming Home Assistant cache...");
        cache.refresh().await;

        let weather = Arc::new(WeatherService::new(
            Arc::new(YrClient::new(&config.weather)?),
            &config.weather,
        ));

        let mut registry = ToolRegistry::new();
        register_home_tools(
            &mut registry,
            Arc::new(HomeTools::new(cache.clone(), hub.clone())),
        );
        let registry = Arc::new(registry);

        let provider: Arc<dyn LlmProvider> = Arc::new(HttpProvider::from_config(&config.llm)?);
        let chat = Arc::new(ChatManager::new(
            provider,
            registry.clone(),
            config.llm.max_tokens,
            config.llm.temperature,
        ));

        let users = match &config.database.url {
            Some(url) => Some(Arc::new(UserStore::connect(url)?)),
            None => {
                log::info!("No database configured, user verification disabled");
                None
            }
        };

        Ok(Self {
            conf: Arc::new(config),
            hub,
            cache,
            weather,
            registry,
            chat,
            users,
        })
    }

    #[must_use]
    pub fn config(&self) -> Arc<AppConfig> {
        self.conf.clone()
    }

    #[must_use]
    pub fn hub(&self) -> Arc<dyn HubApi> {
        self.hub.clone()
    }

    #[must_use]
    pub fn cache(&self) -> Arc<EntityCache> {
        self.cache.clone()
    }

    #[must_use]
    pub fn weather(&self) -> Arc<WeatherService> {
        self.weather.clone()
    }

    #[must_use]
    pub fn registry(&self) -> Arc<ToolRegistry> {
        self.registry.clone()
    }

    #[must_use]
    pub fn chat(&self) -> Arc<ChatManager> {
        self.chat.clone()
    }

    #[must_use]
    pub fn users(&self) -> Option<Arc<UserStore>> {
        self.users.clone()
    }
}

#[cfg(test)]
impl AppState {
    /// Test constructor with injected collaborators; no bootstrap refresh.
    pub fn for_tests(
        hub: Arc<dyn HubApi>,
        provider: Arc<dyn LlmProvider>,
        forecast: Arc<dyn crate::backend::yr::ForecastApi>,
    ) -> Self {
        use std::num::NonZeroU32;

        use huginn_api::config::{
            DatabaseConfig, HubConfig, LlmConfig, ServerConfig, WeatherConfig,
        };

        let config = AppConfig {
            server: ServerConfig {
                listen_address: std::net::Ipv4Addr::LOCALHOST,
                port: 0,
            },
            hub: HubConfig {
                url: url::Url::parse("http://hub.test:8123").unwrap(),
                token_env: None,
                poll_interval_secs: NonZeroU32::new(5),
            },
            weather: WeatherConfig {
                url: url::Url::parse("https://weather.test").unwrap(),
                user_agent: "huginn-test".to_string(),
                cache_minutes: 30,
                locations: Vec::new(),
            },
            llm: LlmConfig {
                model: "test-model".to_string(),
                base_url: url::Url::parse("http://llm.test").unwrap(),
                api_key_env: None,
                max_tokens: 256,
                temperature: 0.0,
            },
            database: DatabaseConfig::default(),
        };

        let cache = Arc::new(EntityCache::new(hub.clone()));
        let weather = Arc::new(WeatherService::new(forecast, &config.weather));

        let mut registry = ToolRegistry::new();
        register_home_tools(
            &mut registry,
            Arc::new(HomeTools::new(cache.clone(), hub.clone())),
        );
        let registry = Arc::new(registry);

        let chat = Arc::new(ChatManager::new(
            provider,
            registry.clone(),
            config.llm.max_tokens,
            config.llm.temperature,
        ));

        Self {
            conf: Arc::new(config),
            hub,
            cache,
            weather,
            registry,
            chat,
            users: None,
        }
    }
}
