//! Open-Meteo forecast fetcher.
//!
//! [`OpenMeteoFetcher`] is the production [`RemoteFetcher`]. It issues
//! `GET {base_url}&latitude={lat}&longitude={lon}` and decodes the hourly
//! temperature series from the response.

use std::time::Duration;

use exhibit_core::{
    CancellationToken, FetchError, Forecast, RemoteFetcher, SelectionEntity, TimeSeries,
    WeatherConfig,
};
use serde::Deserialize;

use crate::error::{NetworkError, Result};
use crate::http::HttpClient;
use crate::logging::targets;

/// Wire shape of an Open-Meteo forecast response. Every field is optional;
/// missing arrays decode as empty series.
#[derive(Debug, Default, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    hourly: Option<HourlyResponse>,
}

#[derive(Debug, Default, Deserialize)]
struct HourlyResponse {
    #[serde(default)]
    time: Option<Vec<String>>,
    #[serde(default)]
    temperature_2m: Option<Vec<f64>>,
}

impl From<ForecastResponse> for Forecast {
    fn from(response: ForecastResponse) -> Self {
        let hourly = response.hourly.unwrap_or_default();
        Forecast {
            timezone: response.timezone.unwrap_or_default(),
            time_series: TimeSeries {
                labels: hourly.time.unwrap_or_default(),
                values: hourly.temperature_2m.unwrap_or_default(),
            },
        }
    }
}

/// Fetches hourly temperature forecasts from Open-Meteo.
#[derive(Debug, Clone)]
pub struct OpenMeteoFetcher {
    client: HttpClient,
    base_url: String,
}

impl OpenMeteoFetcher {
    /// Create a fetcher using `client` against `base_url`.
    pub fn new(client: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Create a fetcher from the exhibit configuration.
    pub fn from_config(config: &WeatherConfig) -> Result<Self> {
        let client = HttpClient::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .default_header(http::header::ACCEPT, "application/json")?
            .build()?;
        Ok(Self::new(client, config.base_url.clone()))
    }

    /// The configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn request(&self, entity: &SelectionEntity) -> Result<Forecast> {
        let response = self
            .client
            .get(&self.base_url)
            .query("latitude", entity.latitude)
            .query("longitude", entity.longitude)
            .send()
            .await?
            .error_for_status_with_body()
            .await?;

        let body: ForecastResponse = response.json().await?;
        Ok(body.into())
    }
}

impl RemoteFetcher for OpenMeteoFetcher {
    async fn fetch(
        &self,
        entity: &SelectionEntity,
        token: &CancellationToken,
    ) -> std::result::Result<Forecast, FetchError> {
        if token.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        tracing::debug!(target: targets::WEATHER, key = %entity.key, "requesting forecast");

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(NetworkError::Cancelled),
            result = self.request(entity) => result,
        };

        match result {
            Ok(forecast) => {
                tracing::debug!(
                    target: targets::WEATHER,
                    key = %entity.key,
                    points = forecast.time_series.values.len(),
                    "forecast received"
                );
                Ok(forecast)
            }
            Err(err) => {
                tracing::warn!(target: targets::WEATHER, key = %entity.key, error = %err, "forecast request failed");
                Err(err.into())
            }
        }
    }
}
