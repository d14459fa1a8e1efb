use moka::future::Cache;
use reqwest::Client;
use std::time::Duration;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::weather::models::{ForecastResponse, WeatherSummary};

/// Number of forward days averaged into the exogenous weather window.
const FORECAST_DAYS: u8 = 7;

pub struct WeatherClient {
    http_client: Client,
    base_url: String,
    cache: Cache<String, WeatherSummary>,
}

impl WeatherClient {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.weather_timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        // Stations in the same district share coordinates at 0.01 degree
        // resolution, so one upstream call serves a whole forecast batch.
        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(config.weather_cache_ttl_seconds))
            .build();

        Self {
            http_client,
            base_url: config.weather_base_url.clone(),
            cache,
        }
    }

    /// Averaged 7-day-forward precipitation and max temperature for a
    /// coordinate. Never fails: upstream errors and timeouts degrade to a
    /// zero-valued summary so a weather outage cannot abort a forecast batch.
    pub async fn forecast_summary(&self, latitude: f64, longitude: f64) -> WeatherSummary {
        let cache_key = format!("{latitude:.2}:{longitude:.2}");

        if let Some(summary) = self.cache.get(&cache_key).await {
            return summary;
        }

        match self.fetch_forecast(latitude, longitude).await {
            Ok(response) => {
                let summary = WeatherSummary::from(&response);
                self.cache.insert(cache_key, summary).await;
                summary
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    latitude,
                    longitude,
                    "Weather fetch failed, using zero exogenous input"
                );
                WeatherSummary::zero()
            }
        }
    }

    /// Raw forecast fetch.
    ///
    /// # Errors
    ///
    /// Returns `AppError::WeatherApi` if the request fails or returns an
    /// error status.
    async fn fetch_forecast(&self, latitude: f64, longitude: f64) -> AppResult<ForecastResponse> {
        let url = format!(
            "{}/forecast?latitude={latitude}&longitude={longitude}&daily=precipitation_sum,temperature_2m_max&forecast_days={FORECAST_DAYS}",
            self.base_url
        );

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::WeatherApi(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::WeatherApi(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::WeatherApi(format!("Failed to parse response: {e}")))
    }
}
