//! Store records as they move through the pipeline stages.

use serde::{Deserialize, Serialize};

/// Geographic point (lat/lon)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Finite and inside the WGS84 lat/lon ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Convert into a `geo` point (x = lon, y = lat).
    pub fn to_point(self) -> geo::Point<f64> {
        geo::Point::new(self.lon, self.lat)
    }
}

/// Fixed reference point that ranked distances are measured from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Origin {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

impl Origin {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

impl Default for Origin {
    /// Hyehwa Station, Seoul
    fn default() -> Self {
        Self {
            name: "혜화역".to_string(),
            lat: 37.582236,
            lon: 127.001967,
        }
    }
}

/// One row of the raw store list.
///
/// Every field is carried as text exactly as collected; only `is_key_store`
/// is interpreted on read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    pub name: String,
    pub category: String,
    pub address: String,
    pub phone: String,
    pub opening_hours: String,
    pub nearest_station: String,
    pub review_score: String,
    /// Semicolon-delimited material tokens
    pub materials: String,
    pub is_key_store: bool,
}

impl StoreRecord {
    /// Material tokens, trimmed, empty entries skipped.
    pub fn materials(&self) -> impl Iterator<Item = &str> {
        self.materials
            .split(';')
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }

    pub fn has_material(&self, material: &str) -> bool {
        self.materials().any(|m| m == material)
    }

    pub fn review_score(&self) -> Option<f64> {
        self.review_score.trim().parse().ok()
    }

    pub fn has_address(&self) -> bool {
        !self.address.trim().is_empty()
    }
}

/// Parse the key-store flag leniently. Spreadsheet exports disagree on casing.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "y" | "yes"
    )
}

pub fn format_flag(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// Store with resolved coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodedStore {
    pub store: StoreRecord,
    pub point: GeoPoint,
}

/// Store annotated with its distance from the pipeline origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedStore {
    pub store: StoreRecord,
    pub point: GeoPoint,
    pub distance_km: f64,
}
