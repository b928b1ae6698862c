//! Test doubles shared by the unit tests in this crate.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use weatherdash_core::StorageError;
use weatherdash_weather::{Conditions, ConditionsSource, TemperatureUnit, WeatherCondition, WeatherError};

use crate::store::{KeyValueStore, MemoryKeyValueStore};

pub(crate) fn conditions(name: &str, temperature: f64) -> Conditions {
    Conditions {
        name: name.to_string(),
        temperature,
        feels_like: temperature,
        summary: "Clouds".to_string(),
        description: "overcast clouds".to_string(),
        icon: "04d".to_string(),
        wind_speed: 2.0,
        condition: WeatherCondition::Cloudy,
        fetched_at: chrono::Utc::now(),
    }
}

/// Answers from a table; cities missing from the table are not found.
#[derive(Default)]
pub(crate) struct FakeSource {
    temperatures: Mutex<HashMap<String, f64>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl FakeSource {
    pub(crate) fn with(entries: &[(&str, f64)]) -> Self {
        let source = Self::default();
        for (city, temp) in entries {
            source.set(city, *temp);
        }
        source
    }

    /// Make every fetch take `delay` before answering.
    pub(crate) fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn set(&self, city: &str, temperature: f64) {
        self.temperatures.lock().insert(city.to_string(), temperature);
    }

    pub(crate) fn fail(&self, city: &str) {
        self.temperatures.lock().remove(city);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ConditionsSource for FakeSource {
    async fn fetch_conditions(
        &self,
        city: &str,
        unit: TemperatureUnit,
    ) -> Result<Conditions, WeatherError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let temperature = self.temperatures.lock().get(city).copied();
        let temperature = temperature.ok_or_else(|| WeatherError::NotFound(city.to_string()))?;
        Ok(match unit {
            TemperatureUnit::Celsius => conditions(city, temperature),
            TemperatureUnit::Fahrenheit => conditions(city, temperature * 9.0 / 5.0 + 32.0),
        })
    }
}

/// In-memory slots whose reads or writes can be made to fail.
#[derive(Default)]
pub(crate) struct FlakyKeyValueStore {
    inner: MemoryKeyValueStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FlakyKeyValueStore {
    /// The underlying slots, bypassing injected failures.
    pub(crate) fn inner(&self) -> &MemoryKeyValueStore {
        &self.inner
    }

    pub(crate) fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

fn unavailable() -> StorageError {
    StorageError::Io(io::Error::other("storage unavailable"))
}

impl KeyValueStore for FlakyKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.set(key, value)
    }
}
