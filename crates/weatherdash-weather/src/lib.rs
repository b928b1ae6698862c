//! Weather service for the dashboard
//!
//! Fetches current conditions per city from the OpenWeatherMap API and
//! validates them into typed records.

pub mod provider;
pub mod types;

pub use provider::{ConditionsSource, WeatherProvider, DEFAULT_BASE_URL};
pub use types::*;
