use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::Origin;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub origin: Origin,
    pub paths: PathsConfig,
    pub geocoder: GeocoderConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    /// Raw store list
    pub raw: PathBuf,
    /// Coordinate-enriched table written by the geocoder
    pub geocoded: PathBuf,
    /// Final ranked table read by the dashboard
    pub ranked: PathBuf,
    /// Addresses the geocoder could not resolve
    pub unresolved: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw: PathBuf::from("art_stores_original.csv"),
            geocoded: PathBuf::from("art_stores_with_coords.csv"),
            ranked: PathBuf::from("final_ranked_art_stores.csv"),
            unresolved: PathBuf::from("unresolved_addresses.csv"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeocoderConfig {
    /// Nominatim-compatible search endpoint
    pub endpoint: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Maximum outstanding lookups
    pub concurrency: usize,
    /// Minimum gap between request starts, per the public Nominatim policy
    pub min_interval_ms: u64,
    pub country_codes: Option<String>,
    pub accept_language: Option<String>,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://nominatim.openstreetmap.org/search".to_string(),
            user_agent: "art_store_finder".to_string(),
            timeout_secs: 10,
            concurrency: 1,
            min_interval_ms: 1000,
            country_codes: None,
            accept_language: Some("ko".to_string()),
        }
    }
}

impl GeocoderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    /// Prefix written tables with a UTF-8 byte order mark so spreadsheet
    /// tools detect the encoding of Hangul text.
    pub write_bom: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { write_bom: true }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise use the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.origin.point().is_valid() {
            bail!(
                "origin '{}' has invalid coordinates ({}, {})",
                self.origin.name,
                self.origin.lat,
                self.origin.lon
            );
        }
        if self.geocoder.concurrency == 0 {
            bail!("geocoder.concurrency must be at least 1");
        }
        if self.geocoder.timeout_secs == 0 {
            bail!("geocoder.timeout_secs must be at least 1");
        }
        Ok(())
    }
}
