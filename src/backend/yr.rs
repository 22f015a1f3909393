use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use huginn_api::config::WeatherConfig;

use crate::error::ApiResult;

// met.no locationforecast response, reduced to the fields the weather
// cache consumes (first timeseries entry only).

#[derive(Clone, Debug, Deserialize)]
pub struct LocationForecast {
    pub properties: ForecastProperties,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ForecastProperties {
    pub timeseries: Vec<TimeSeries>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TimeSeries {
    pub time: String,
    pub data: TimeSeriesData,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TimeSeriesData {
    pub instant: Instant,
    #[serde(default)]
    pub next_1_hours: Option<NextHours>,
    #[serde(default)]
    pub next_6_hours: Option<NextHours>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Instant {
    pub details: InstantDetails,
}

#[derive(Clone, Debug, Deserialize)]
pub struct InstantDetails {
    pub air_temperature: f64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NextHours {
    pub summary: ForecastSummary,
    #[serde(default)]
    pub details: Option<PrecipitationDetails>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ForecastSummary {
    pub symbol_code: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PrecipitationDetails {
    #[serde(default)]
    pub precipitation_amount: Option<f64>,
}

/// Forecast lookup seam. The production impl talks to api.met.no; tests
/// substitute canned forecasts.
#[async_trait]
pub trait ForecastApi: Send + Sync {
    /// Best-effort fetch: `None` on any transport or parse failure.
    async fn fetch_forecast(&self, lat: f64, lon: f64) -> Option<LocationForecast>;
}

pub struct YrClient {
    base_url: Url,
    user_agent: String,
    http: reqwest::Client,
}

impl YrClient {
    const DEFAULT_TIMEOUT_SECS: u64 = 10;

    pub fn new(config: &WeatherConfig) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            base_url: config.url.clone(),
            user_agent: config.user_agent.clone(),
            http,
        })
    }

    async fn get_forecast(&self, lat: f64, lon: f64) -> ApiResult<LocationForecast> {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("compact");
        }
        url.query_pairs_mut()
            .append_pair("lat", &lat.to_string())
            .append_pair("lon", &lon.to_string());

        let response = self
            .http
            .get(url)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/json")
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ForecastApi for YrClient {
    async fn fetch_forecast(&self, lat: f64, lon: f64) -> Option<LocationForecast> {
        log::info!("Fetching weather forecast for lat={lat}, lon={lon}");
        match self.get_forecast(lat, lon).await {
            Ok(forecast) => Some(forecast),
            Err(err) => {
                log::error!("Failed to fetch weather forecast for lat={lat}, lon={lon}: {err}");
                None
            }
        }
    }
}
