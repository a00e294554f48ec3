//! Resolver backed by a Nominatim `/search` endpoint.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::debug;
use url::Url;

use crate::config::GeocoderConfig;
use crate::error::ResolveError;
use crate::models::GeoPoint;

use super::Resolver;

/// Geocodes addresses against OpenStreetMap Nominatim.
///
/// Request starts are spaced at least `min_interval` apart regardless of how
/// many lookups the caller keeps in flight. The spacing is handed out through
/// [`Resolver::wait_turn`], ahead of the per-lookup timeout.
pub struct NominatimResolver {
    client: Client,
    endpoint: Url,
    timeout: Duration,
    min_interval: Duration,
    country_codes: Option<String>,
    accept_language: Option<String>,
    last_request: Mutex<Option<Instant>>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
}

impl NominatimResolver {
    pub fn new(config: &GeocoderConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint).context("Invalid geocoder endpoint")?;
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint,
            timeout: config.timeout(),
            min_interval: config.min_interval(),
            country_codes: config.country_codes.clone(),
            accept_language: config.accept_language.clone(),
            last_request: Mutex::new(None),
        })
    }

    fn search_url(&self, address: &str) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("q", address)
                .append_pair("format", "jsonv2")
                .append_pair("limit", "1");
            if let Some(codes) = &self.country_codes {
                query.append_pair("countrycodes", codes);
            }
            if let Some(lang) = &self.accept_language {
                query.append_pair("accept-language", lang);
            }
        }
        url
    }

    /// Wait until the next request may start.
    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

fn first_hit(hits: Vec<SearchHit>) -> Result<Option<GeoPoint>, ResolveError> {
    let Some(hit) = hits.into_iter().next() else {
        return Ok(None);
    };

    let lat: f64 = hit
        .lat
        .parse()
        .map_err(|_| ResolveError::Decode(format!("latitude '{}'", hit.lat)))?;
    let lon: f64 = hit
        .lon
        .parse()
        .map_err(|_| ResolveError::Decode(format!("longitude '{}'", hit.lon)))?;

    let point = GeoPoint::new(lat, lon);
    if !point.is_valid() {
        return Err(ResolveError::InvalidCoordinate { lat, lon });
    }

    debug!(
        "Matched {} at ({}, {})",
        hit.display_name.as_deref().unwrap_or("?"),
        lat,
        lon
    );
    Ok(Some(point))
}

impl Resolver for NominatimResolver {
    async fn resolve(&self, address: &str) -> Result<Option<GeoPoint>, ResolveError> {
        let response = self
            .client
            .get(self.search_url(address))
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Status(status));
        }

        let hits: Vec<SearchHit> = response
            .json()
            .await
            .map_err(|e| ResolveError::Decode(e.to_string()))?;
        first_hit(hits)
    }

    async fn wait_turn(&self) {
        self.throttle().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> NominatimResolver {
        let config = GeocoderConfig {
            country_codes: Some("kr".to_string()),
            ..Default::default()
        };
        NominatimResolver::new(&config).unwrap()
    }

    #[test]
    fn test_search_url() {
        let url = resolver().search_url("서울 종로구 대학로 1");
        assert_eq!(url.host_str(), Some("nominatim.openstreetmap.org"));
        assert_eq!(url.path(), "/search");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("q".to_string(), "서울 종로구 대학로 1".to_string()),
                ("format".to_string(), "jsonv2".to_string()),
                ("limit".to_string(), "1".to_string()),
                ("countrycodes".to_string(), "kr".to_string()),
                ("accept-language".to_string(), "ko".to_string()),
            ]
        );
    }

    #[test]
    fn test_first_hit_parses_string_coordinates() {
        let hits: Vec<SearchHit> = serde_json::from_str(
            r#"[{"place_id": 1, "lat": "37.4979", "lon": "127.0276", "display_name": "강남역"}]"#,
        )
        .unwrap();
        assert_eq!(
            first_hit(hits).unwrap(),
            Some(GeoPoint::new(37.4979, 127.0276))
        );
    }

    #[test]
    fn test_empty_result_is_not_found() {
        let hits: Vec<SearchHit> = serde_json::from_str("[]").unwrap();
        assert_eq!(first_hit(hits).unwrap(), None);
    }

    #[test]
    fn test_garbage_coordinates_are_errors() {
        let hits: Vec<SearchHit> =
            serde_json::from_str(r#"[{"lat": "north", "lon": "127.0"}]"#).unwrap();
        assert!(matches!(first_hit(hits), Err(ResolveError::Decode(_))));

        let hits: Vec<SearchHit> =
            serde_json::from_str(r#"[{"lat": "137.0", "lon": "127.0"}]"#).unwrap();
        assert!(matches!(
            first_hit(hits),
            Err(ResolveError::InvalidCoordinate { .. })
        ));
    }

    #[tokio::test]
    async fn test_queued_lookups_are_sent_before_timing_out() {
        use crate::geocoder::{geocode_stores, GeocodeOptions, UnresolvedCause};
        use crate::models::StoreRecord;
        use indicatif::ProgressBar;

        // Nothing listens on port 1, so every request that is actually sent
        // fails fast with a transport error rather than a lookup timeout.
        // The fifth lookup queues for 1.2s behind the interval, past the 1s
        // lookup timeout.
        let config = GeocoderConfig {
            endpoint: "http://127.0.0.1:1/search".to_string(),
            timeout_secs: 1,
            min_interval_ms: 300,
            concurrency: 5,
            ..Default::default()
        };
        let resolver = NominatimResolver::new(&config).unwrap();
        let stores = (0..5)
            .map(|i| StoreRecord {
                name: format!("store {i}"),
                address: format!("서울 종로구 대학로 {i}"),
                ..Default::default()
            })
            .collect();
        let options = GeocodeOptions {
            timeout: config.timeout(),
            concurrency: config.concurrency,
        };

        let outcome = geocode_stores(stores, &resolver, &options, &ProgressBar::hidden()).await;

        assert_eq!(outcome.unresolved.len(), 5);
        for entry in &outcome.unresolved {
            assert!(
                !matches!(
                    entry.cause,
                    UnresolvedCause::Failed(ResolveError::Timeout(_))
                ),
                "row {}: {}",
                entry.row,
                entry.cause
            );
        }
    }

    #[tokio::test]
    async fn test_throttle_spaces_requests() {
        let config = GeocoderConfig {
            min_interval_ms: 50,
            ..Default::default()
        };
        let resolver = NominatimResolver::new(&config).unwrap();

        let start = Instant::now();
        resolver.wait_turn().await;
        resolver.wait_turn().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
