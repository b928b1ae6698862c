//! Static city list for autocomplete and selection.

use serde::{Deserialize, Serialize};

const BUILTIN_CITIES: &str = include_str!("../data/cities.json");

/// One selectable city.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityOption {
    pub title: String,
}

#[derive(Debug, Clone, Default)]
pub struct CityCatalog {
    options: Vec<CityOption>,
}

impl CityCatalog {
    /// The catalog shipped with the binary.
    pub fn builtin() -> Result<Self, serde_json::Error> {
        Self::from_json(BUILTIN_CITIES)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let options: Vec<CityOption> = serde_json::from_str(raw)?;
        tracing::debug!("Loaded {} city option(s)", options.len());
        Ok(Self { options })
    }

    pub fn options(&self) -> &[CityOption] {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Up to `limit` cities starting with `prefix` (case-insensitive), in
    /// catalog order. A blank prefix matches everything.
    pub fn suggest(&self, prefix: &str, limit: usize) -> Vec<&CityOption> {
        let prefix = prefix.trim().to_lowercase();
        self.options
            .iter()
            .filter(|o| o.title.to_lowercase().starts_with(&prefix))
            .take(limit)
            .collect()
    }

    /// The option named by `input`, if any. `None` means no city is selected.
    pub fn resolve(&self, input: &str) -> Option<&CityOption> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        self.options.iter().find(|o| o.title.eq_ignore_ascii_case(input))
    }
}
