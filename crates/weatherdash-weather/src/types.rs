use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use weatherdash_core::TemperatureUnit;

const ICON_BASE_URL: &str = "http://openweathermap.org/img/wn";

/// Weather condition categories mapped from the upstream condition group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    #[default]
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    Snow,
    Thunderstorm,
    Squall,
}

impl WeatherCondition {
    /// Classify from `weather[0].main`, falling back to the icon code.
    /// See: https://openweathermap.org/weather-conditions
    pub fn classify(group: &str, icon: &str) -> Self {
        match group {
            "Thunderstorm" => Self::Thunderstorm,
            "Drizzle" => Self::Drizzle,
            "Rain" => Self::Rain,
            "Snow" => Self::Snow,
            "Clear" => Self::Clear,
            // "few clouds" carries the 02 icon, everything heavier is 03/04
            "Clouds" if icon.starts_with("02") => Self::PartlyCloudy,
            "Clouds" => Self::Cloudy,
            "Mist" | "Fog" | "Haze" | "Smoke" | "Dust" | "Sand" | "Ash" => Self::Fog,
            "Squall" | "Tornado" => Self::Squall,
            _ => Self::from_icon_code(icon),
        }
    }

    /// Convert an icon code such as "10d" to a condition
    pub fn from_icon_code(icon: &str) -> Self {
        let code = icon.get(..2).and_then(|c| c.parse::<u8>().ok()).unwrap_or(1);
        match code {
            1 => Self::Clear,
            2 => Self::PartlyCloudy,
            3 | 4 => Self::Cloudy,
            9 | 10 => Self::Rain,
            11 => Self::Thunderstorm,
            13 => Self::Snow,
            50 => Self::Fog,
            _ => Self::Clear, // Unknown codes default to clear
        }
    }

    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Fog => "Fog",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::Snow => "Snow",
            Self::Thunderstorm => "Thunderstorm",
            Self::Squall => "Squall",
        }
    }

    /// Get icon name for text front ends
    pub fn icon_name(&self) -> &'static str {
        match self {
            Self::Clear => "sun",
            Self::PartlyCloudy => "cloud_sun",
            Self::Cloudy => "cloud",
            Self::Fog => "cloud_fog",
            Self::Drizzle => "cloud_rain",
            Self::Rain => "cloud_rain",
            Self::Snow => "cloud_snow",
            Self::Thunderstorm => "cloud_lightning",
            Self::Squall => "wind",
        }
    }
}

/// Current conditions for one city, in the unit it was requested with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conditions {
    /// City name as reported upstream
    pub name: String,
    pub temperature: f64,
    pub feels_like: f64,
    /// Condition group, e.g. "Clouds"
    pub summary: String,
    /// Condition detail, e.g. "broken clouds"
    pub description: String,
    /// Upstream icon code, e.g. "04d"
    pub icon: String,
    pub wind_speed: f64,
    pub condition: WeatherCondition,
    pub fetched_at: DateTime<Utc>,
}

impl Conditions {
    pub fn icon_url(&self) -> String {
        format!("{}/{}@2x.png", ICON_BASE_URL, self.icon)
    }
}

/// Raw current-weather payload. Only the rendered fields are read.
#[derive(Debug, Deserialize)]
pub(crate) struct CurrentWeatherResponse {
    name: String,
    main: MainBlock,
    weather: Vec<ConditionBlock>,
    wind: WindBlock,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
    feels_like: f64,
}

#[derive(Debug, Deserialize)]
struct ConditionBlock {
    main: String,
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct WindBlock {
    speed: f64,
}

impl CurrentWeatherResponse {
    /// Validate the payload into a typed record.
    pub(crate) fn into_conditions(
        self,
        fetched_at: DateTime<Utc>,
    ) -> Result<Conditions, WeatherError> {
        if self.name.trim().is_empty() {
            return Err(WeatherError::Parse("response has no city name".into()));
        }
        let first = self
            .weather
            .into_iter()
            .next()
            .ok_or_else(|| WeatherError::Parse("response has no weather entries".into()))?;

        Ok(Conditions {
            condition: WeatherCondition::classify(&first.main, &first.icon),
            name: self.name,
            temperature: self.main.temp,
            feels_like: self.main.feels_like,
            summary: first.main,
            description: first.description,
            icon: first.icon,
            wind_speed: self.wind.speed,
            fetched_at,
        })
    }
}

/// Weather provider errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    /// City unknown upstream, or the request failed in transit.
    #[error("City not found: {0}")]
    NotFound(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Network error: {0}")]
    Network(#[from] weatherdash_core::NetworkError),
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

impl From<WeatherError> for weatherdash_core::WidgetError {
    fn from(err: WeatherError) -> Self {
        match err {
            WeatherError::NotFound(city) => Self::NotFound(city),
            other => Self::NotFound(other.to_string()),
        }
    }
}
