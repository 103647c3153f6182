//! Configuration loading from TOML files
//!
//! Config file is selected by the host application; `Config::load` falls
//! back to built-in defaults when the file is missing or malformed. The
//! defaults mirror the shipped application: Manila fallback coordinate,
//! 2 s / 10 m watch throttle.

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct GeolocationConfig {
    /// Substituted when live positioning is unavailable
    #[serde(default = "default_fallback_latitude")]
    pub fallback_latitude: f64,
    #[serde(default = "default_fallback_longitude")]
    pub fallback_longitude: f64,
    /// Bound on the platform permission prompt
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Bound on a single position fix
    #[serde(default = "default_fix_timeout_ms")]
    pub fix_timeout_ms: u64,
    /// Minimum interval between delivered watch samples
    #[serde(default = "default_watch_min_interval_ms")]
    pub watch_min_interval_ms: u64,
    /// Minimum displacement between delivered watch samples
    #[serde(default = "default_watch_min_distance_m")]
    pub watch_min_distance_m: f64,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            fallback_latitude: default_fallback_latitude(),
            fallback_longitude: default_fallback_longitude(),
            request_timeout_ms: default_request_timeout_ms(),
            fix_timeout_ms: default_fix_timeout_ms(),
            watch_min_interval_ms: default_watch_min_interval_ms(),
            watch_min_distance_m: default_watch_min_distance_m(),
        }
    }
}

// Manila, Philippines
fn default_fallback_latitude() -> f64 {
    14.5995
}

fn default_fallback_longitude() -> f64 {
    120.9842
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_fix_timeout_ms() -> u64 {
    8_000
}

fn default_watch_min_interval_ms() -> u64 {
    2_000
}

fn default_watch_min_distance_m() -> f64 {
    10.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// File path for the place store (JSON map)
    #[serde(default = "default_storage_file")]
    pub file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { file: default_storage_file() }
    }
}

fn default_storage_file() -> String {
    "places.json".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CatalogConfig {
    /// Route list endpoint; the embedded list is used when unset
    #[serde(default)]
    pub url: Option<String>,
    /// Bound on a catalog fetch
    #[serde(default = "default_catalog_timeout_ms")]
    pub fetch_timeout_ms: u64,
}

fn default_catalog_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Remote document store base URL
    #[serde(default = "default_sync_base_url")]
    pub base_url: String,
    /// Poll interval for remote subscriptions
    #[serde(default = "default_sync_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: default_sync_base_url(),
            poll_interval_ms: default_sync_poll_interval_ms(),
        }
    }
}

fn default_sync_base_url() -> String {
    "https://transitapp-699b9.firebaseio.com".to_string()
}

fn default_sync_poll_interval_ms() -> u64 {
    2_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuidanceConfig {
    /// Distance from the route geometry beyond which a sample counts as
    /// off route
    #[serde(default = "default_off_route_threshold_m")]
    pub off_route_threshold_m: f64,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self { off_route_threshold_m: default_off_route_threshold_m() }
    }
}

fn default_off_route_threshold_m() -> f64 {
    50.0
}

#[derive(Debug, Clone, Deserialize, Default)]
struct TomlConfig {
    #[serde(default)]
    geolocation: GeolocationConfig,
    #[serde(default)]
    storage: StorageConfig,
    #[serde(default)]
    catalog: CatalogConfig,
    #[serde(default)]
    sync: SyncConfig,
    #[serde(default)]
    guidance: GuidanceConfig,
}

/// Main configuration struct used throughout the engine
#[derive(Debug, Clone, Default)]
pub struct Config {
    geolocation: GeolocationConfig,
    storage: StorageConfig,
    catalog: CatalogConfig,
    sync: SyncConfig,
    guidance: GuidanceConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self {
            geolocation: toml_config.geolocation,
            storage: toml_config.storage,
            catalog: toml_config.catalog,
            sync: toml_config.sync,
            guidance: toml_config.guidance,
        })
    }

    /// Load configuration - tries the TOML file first, falls back to
    /// defaults with a warning
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "config_load_failed, using defaults");
                Self::default()
            }
        }
    }

    pub fn geolocation(&self) -> &GeolocationConfig {
        &self.geolocation
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn catalog(&self) -> &CatalogConfig {
        &self.catalog
    }

    pub fn sync(&self) -> &SyncConfig {
        &self.sync
    }

    pub fn guidance(&self) -> &GuidanceConfig {
        &self.guidance
    }

    /// Fallback coordinate as a domain value
    pub fn fallback_coordinate(&self) -> crate::domain::Coordinate {
        crate::domain::Coordinate::new(
            self.geolocation.fallback_latitude,
            self.geolocation.fallback_longitude,
        )
    }

    /// Builder method for tests to set the fallback coordinate
    #[cfg(test)]
    pub fn with_fallback(mut self, latitude: f64, longitude: f64) -> Self {
        self.geolocation.fallback_latitude = latitude;
        self.geolocation.fallback_longitude = longitude;
        self
    }
}
