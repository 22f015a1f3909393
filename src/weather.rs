use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use huginn_api::config::{LocationConfig, WeatherConfig};
use huginn_api::dashboard::WeatherDto;

use crate::backend::yr::ForecastApi;

/// Per-location forecast cache with a fixed freshness window. A failed
/// fetch is cached too, as the "unknown" fallback report.
pub struct WeatherService {
    client: Arc<dyn ForecastApi>,
    locations: Vec<LocationConfig>,
    cache_window: Duration,
    cache: Mutex<HashMap<String, (DateTime<Utc>, WeatherDto)>>,
}

impl WeatherService {
    #[must_use]
    pub fn new(client: Arc<dyn ForecastApi>, config: &WeatherConfig) -> Self {
        Self {
            client,
            locations: config.locations.clone(),
            cache_window: Duration::minutes(i64::from(config.cache_minutes)),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn weather(&self) -> Vec<WeatherDto> {
        let mut reports = Vec::with_capacity(self.locations.len());
        for location in &self.locations {
            reports.push(self.cached_or_fetch(location).await);
        }
        reports
    }

    async fn cached_or_fetch(&self, location: &LocationConfig) -> WeatherDto {
        let now = Utc::now();

        {
            let cache = self.cache.lock().await;
            if let Some((fetched_at, report)) = cache.get(&location.name) {
                if *fetched_at + self.cache_window > now {
                    return report.clone();
                }
            }
        }

        let report = match self.client.fetch_forecast(location.lat, location.lon).await {
            Some(forecast) => Self::to_report(location, &forecast),
            None => fallback_report(&location.name),
        };

        self.cache
            .lock()
            .await
            .insert(location.name.clone(), (now, report.clone()));
        report
    }

    fn to_report(
        location: &LocationConfig,
        forecast: &crate::backend::yr::LocationForecast,
    ) -> WeatherDto {
        let current = forecast
            .properties
            .timeseries
            .first()
            .map(|entry| &entry.data);

        // Next-hour symbol, with the 6-hour summary as fallback source.
        let symbol_code = current
            .and_then(|d| d.next_1_hours.as_ref())
            .map(|n| n.summary.symbol_code.clone())
            .or_else(|| {
                current
                    .and_then(|d| d.next_6_hours.as_ref())
                    .map(|n| n.summary.symbol_code.clone())
            })
            .unwrap_or_else(|| "unknown".to_string());

        WeatherDto {
            location: location.name.clone(),
            temperature: current.map_or(0.0, |d| d.instant.details.air_temperature),
            symbol_code,
            precipitation_amount: current
                .and_then(|d| d.next_1_hours.as_ref())
                .and_then(|n| n.details.as_ref())
                .and_then(|d| d.precipitation_amount),
        }
    }
}

fn fallback_report(location: &str) -> WeatherDto {
    WeatherDto {
        location: location.to_string(),
        temperature: 0.0,
        symbol_code: "unknown".to_string(),
        precipitation_amount: None,
    }
}
