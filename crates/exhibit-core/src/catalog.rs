//! Weather panel configuration and the selection catalog.
//!
//! The configuration is a TOML document:
//!
//! ```toml
//! base_url = "https://api.open-meteo.com/v1/forecast?hourly=temperature_2m"
//! cache_ttl_seconds = 3600
//!
//! [[cities]]
//! key = "tokyo"
//! display_name = "Tokyo"
//! latitude = 35.68
//! longitude = 139.76
//! ```
//!
//! [`SelectionCatalog::load`] validates the city list and freezes it in
//! declaration order. Any malformed entry fails the whole load; an empty list
//! is accepted and left to the caller to present.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::cache::normalize_ttl;
use crate::error::{ConfigError, Result};
use crate::logging::targets;

/// Default forecast endpoint (hourly temperature from Open-Meteo).
pub const DEFAULT_BASE_URL: &str = "https://api.open-meteo.com/v1/forecast?hourly=temperature_2m";

/// Default request timeout for the HTTP fetcher.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_cache_ttl_seconds() -> i64 {
    crate::cache::DEFAULT_TTL_SECONDS
}

fn default_request_timeout_seconds() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECONDS
}

/// Parsed weather panel configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeatherConfig {
    /// Forecast endpoint; coordinates are appended as query parameters.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Cache TTL in seconds. Zero or negative means one hour.
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: i64,
    /// Per-request timeout for the HTTP fetcher.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    /// Selectable cities in display order.
    #[serde(default)]
    pub cities: Vec<CityConfig>,
}

/// One city entry as written in the configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CityConfig {
    /// Unique key.
    #[serde(default)]
    pub key: Option<String>,
    /// Label shown on the selection button.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            cache_ttl_seconds: default_cache_ttl_seconds(),
            request_timeout_seconds: default_request_timeout_seconds(),
            cities: Vec::new(),
        }
    }
}

impl WeatherConfig {
    /// Parse a configuration document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Read and parse a configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// The TTL the cache will actually use.
    pub fn effective_cache_ttl(&self) -> i64 {
        normalize_ttl(self.cache_ttl_seconds)
    }
}

/// A selectable entity: a city with its fetch parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionEntity {
    /// Unique key within the catalog; also the cache key.
    pub key: String,
    /// Human-readable label.
    pub label: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl SelectionEntity {
    /// Create an entity directly.
    pub fn new(key: impl Into<String>, label: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            latitude,
            longitude,
        }
    }
}

/// The immutable, ordered list of selectable entities.
#[derive(Debug, Clone, Default)]
pub struct SelectionCatalog {
    entities: Arc<[SelectionEntity]>,
}

impl SelectionCatalog {
    /// Validate the configured cities and build the catalog.
    pub fn load(config: &WeatherConfig) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut entities = Vec::with_capacity(config.cities.len());

        for (index, city) in config.cities.iter().enumerate() {
            let key = required(&city.key, index, "key")?;
            let label = required(&city.display_name, index, "display_name")?;

            for (field, value) in [("latitude", city.latitude), ("longitude", city.longitude)] {
                if !value.is_finite() {
                    return Err(ConfigError::InvalidCoordinate {
                        key: key.to_string(),
                        field,
                        value,
                    });
                }
            }

            if !seen.insert(key) {
                return Err(ConfigError::DuplicateKey {
                    key: key.to_string(),
                });
            }

            entities.push(SelectionEntity::new(key, label, city.latitude, city.longitude));
        }

        tracing::debug!(target: targets::CATALOG, count = entities.len(), "catalog loaded");
        Ok(Self {
            entities: entities.into(),
        })
    }

    /// All entities in display order.
    pub fn entities(&self) -> &[SelectionEntity] {
        &self.entities
    }

    /// Find an entity by key.
    pub fn get(&self, key: &str) -> Option<&SelectionEntity> {
        self.entities.iter().find(|entity| entity.key == key)
    }

    /// Iterate entities in display order.
    pub fn iter(&self) -> std::slice::Iter<'_, SelectionEntity> {
        self.entities.iter()
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if the catalog has no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl<'a> IntoIterator for &'a SelectionCatalog {
    type Item = &'a SelectionEntity;
    type IntoIter = std::slice::Iter<'a, SelectionEntity>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn required<'a>(value: &'a Option<String>, index: usize, field: &'static str) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::MissingField { index, field }),
    }
}
