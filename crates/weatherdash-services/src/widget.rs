//! Widget: one weather card bound to a city and a temperature unit.

use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};
use weatherdash_weather::{Conditions, TemperatureUnit};

static LAST_ID: AtomicI64 = AtomicI64::new(0);

/// Opaque widget identifier derived from the creation time in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WidgetId(i64);

impl WidgetId {
    /// Allocate a fresh id: the current timestamp, bumped past the last
    /// allocated id so ids stay strictly increasing within the process.
    pub fn next() -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        let mut last = LAST_ID.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match LAST_ID.compare_exchange_weak(last, candidate, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => return Self(candidate),
                Err(actual) => last = actual,
            }
        }
    }

    pub fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for WidgetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for WidgetId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// A weather card. `weather_data` is `None` until the first successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    pub id: WidgetId,
    pub city: String,
    pub weather_data: Option<Conditions>,
    pub unit: TemperatureUnit,
}

impl Widget {
    pub fn new(city: impl Into<String>, unit: TemperatureUnit) -> Self {
        Self {
            id: WidgetId::next(),
            city: city.into(),
            weather_data: None,
            unit,
        }
    }

    /// A widget created from a successful search.
    pub fn with_conditions(city: impl Into<String>, unit: TemperatureUnit, conditions: Conditions) -> Self {
        Self {
            weather_data: Some(conditions),
            ..Self::new(city, unit)
        }
    }
}
