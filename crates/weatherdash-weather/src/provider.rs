//! Current-conditions client for the OpenWeatherMap REST API.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use tracing::instrument;
use weatherdash_core::ReqwestErrorExt;

use crate::types::{Conditions, CurrentWeatherResponse, TemperatureUnit, WeatherError};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";
const CURRENT_WEATHER_PATH: &str = "/data/2.5/weather";
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Anything that can produce current conditions for a (city, unit) pair.
///
/// Implementations must report every failure as `WeatherError::NotFound`;
/// callers do not distinguish an unknown city from a transport failure.
pub trait ConditionsSource: Send + Sync + 'static {
    fn fetch_conditions(
        &self,
        city: &str,
        unit: TemperatureUnit,
    ) -> impl Future<Output = Result<Conditions, WeatherError>> + Send;
}

#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Arc<Client>,
    base_url: String,
    api_key: String,
}

impl WeatherProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, WeatherError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Point the provider at another host (proxies, test servers).
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Fetch current conditions for `city` in `unit`.
    ///
    /// The caller guarantees `city` is non-empty.
    #[instrument(skip(self), level = "debug")]
    pub async fn fetch(
        &self,
        city: &str,
        unit: TemperatureUnit,
    ) -> Result<Conditions, WeatherError> {
        match self.request(city, unit).await {
            Ok(conditions) => {
                tracing::debug!("Fetched conditions for {}: {}", city, conditions.summary);
                Ok(conditions)
            }
            Err(e) => {
                tracing::debug!("Weather lookup for {} failed: {}", city, e);
                Err(WeatherError::NotFound(city.to_string()))
            }
        }
    }

    async fn request(&self, city: &str, unit: TemperatureUnit) -> Result<Conditions, WeatherError> {
        let url = format!("{}{}", self.base_url, CURRENT_WEATHER_PATH);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", city),
                ("appid", self.api_key.as_str()),
                ("units", unit.api_param()),
            ])
            .send()
            .await
            .map_err(|e| WeatherError::Network(e.into_network_error()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::NotFound(format!("{} (HTTP {})", city, status.as_u16())));
        }

        let body: CurrentWeatherResponse = response
            .json()
            .await
            .map_err(|e| WeatherError::Network(e.into_network_error()))?;

        body.into_conditions(Utc::now())
    }
}

impl ConditionsSource for WeatherProvider {
    async fn fetch_conditions(
        &self,
        city: &str,
        unit: TemperatureUnit,
    ) -> Result<Conditions, WeatherError> {
        self.fetch(city, unit).await
    }
}
