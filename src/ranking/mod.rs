//! Distance ranking stage.

pub mod distance;

pub use distance::{great_circle_km, haversine_km, EARTH_RADIUS_KM};

use rayon::prelude::*;
use std::path::Path;
use tracing::info;

use crate::error::PipelineError;
use crate::models::{GeocodedStore, Origin, RankedStore};
use crate::table;

/// Stable ascending sort by distance. Equal distances keep their order.
pub fn sort_by_distance(stores: &mut [RankedStore]) {
    stores.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
}

/// Annotate every store with its distance from `origin` and rank ascending.
///
/// A store without a valid coordinate fails the whole batch rather than
/// being ranked with a meaningless distance.
pub fn rank_stores(
    stores: Vec<GeocodedStore>,
    origin: &Origin,
) -> Result<Vec<RankedStore>, PipelineError> {
    let from = origin.point();
    if !from.is_valid() {
        return Err(PipelineError::InvariantViolation {
            row: 0,
            reason: format!("origin '{}' has an invalid coordinate", origin.name),
        });
    }

    if let Some((i, store)) = stores
        .iter()
        .enumerate()
        .find(|(_, s)| !s.point.is_valid())
    {
        return Err(PipelineError::InvariantViolation {
            row: i + 1,
            reason: format!(
                "'{}' reached ranking with coordinate ({}, {})",
                store.store.name, store.point.lat, store.point.lon
            ),
        });
    }

    let mut ranked: Vec<RankedStore> = stores
        .into_par_iter()
        .map(|s| RankedStore {
            distance_km: great_circle_km(from, s.point),
            store: s.store,
            point: s.point,
        })
        .collect();

    sort_by_distance(&mut ranked);
    Ok(ranked)
}

/// Summary of a finished ranking run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankReport {
    pub stores: usize,
    pub nearest_km: Option<f64>,
    pub farthest_km: Option<f64>,
}

/// Run the whole stage: coordinate table in, ranked table out.
pub fn run(
    input: &Path,
    output: &Path,
    origin: &Origin,
    bom: bool,
) -> Result<RankReport, PipelineError> {
    let stores = table::read_geocoded_stores(input)?;
    let ranked = rank_stores(stores, origin)?;
    table::write_ranked_stores(output, &ranked, bom)?;

    let report = RankReport {
        stores: ranked.len(),
        nearest_km: ranked.first().map(|s| s.distance_km),
        farthest_km: ranked.last().map(|s| s.distance_km),
    };
    info!(
        "Ranked {} stores from {} ({:.2} km to {:.2} km)",
        report.stores,
        origin.name,
        report.nearest_km.unwrap_or(0.0),
        report.farthest_km.unwrap_or(0.0)
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeoPoint, StoreRecord};
    use std::fs;

    fn geocoded(name: &str, lat: f64, lon: f64) -> GeocodedStore {
        GeocodedStore {
            store: StoreRecord {
                name: name.to_string(),
                address: format!("{name} 주소"),
                ..Default::default()
            },
            point: GeoPoint::new(lat, lon),
        }
    }

    fn sample() -> Vec<GeocodedStore> {
        vec![
            geocoded("부산", 35.1796, 129.0756),
            geocoded("시청", 37.5665, 126.978),
            geocoded("강남", 37.4979, 127.0276),
            geocoded("시청 옆", 37.5665, 126.978),
            geocoded("홍대", 37.5574, 126.9248),
        ]
    }

    #[test]
    fn test_sorted_ascending_and_stable() {
        let ranked = rank_stores(sample(), &Origin::default()).unwrap();

        let names: Vec<&str> = ranked.iter().map(|s| s.store.name.as_str()).collect();
        assert_eq!(names, vec!["시청", "시청 옆", "홍대", "강남", "부산"]);
        assert!(ranked
            .windows(2)
            .all(|w| w[0].distance_km <= w[1].distance_km));
        assert!(ranked.iter().all(|s| s.distance_km >= 0.0));
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let origin = Origin::default();
        let first = rank_stores(sample(), &origin).unwrap();
        let second = rank_stores(sample(), &origin).unwrap();

        let bits = |r: &[RankedStore]| -> Vec<u64> {
            r.iter().map(|s| s.distance_km.to_bits()).collect()
        };
        assert_eq!(bits(first.as_slice()), bits(second.as_slice()));
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_coordinate_fails_batch() {
        let mut stores = sample();
        stores[2].point.lon = f64::NAN;

        match rank_stores(stores, &Origin::default()).unwrap_err() {
            PipelineError::InvariantViolation { row, .. } => assert_eq!(row, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(rank_stores(Vec::new(), &Origin::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_run_twice_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("coords.csv");
        let first = dir.path().join("ranked-1.csv");
        let second = dir.path().join("ranked-2.csv");
        table::write_geocoded_stores(&input, &sample(), true).unwrap();

        let origin = Origin::default();
        let report = run(&input, &first, &origin, true).unwrap();
        run(&input, &second, &origin, true).unwrap();

        assert_eq!(report.stores, 5);
        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());

        let ranked = table::read_ranked_stores(&first).unwrap();
        assert_eq!(ranked[0].store.name, "시청");
        assert!((ranked[0].distance_km - 2.7428).abs() < 1e-3);
    }

    #[test]
    fn test_run_with_malformed_input_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("coords.csv");
        let output = dir.path().join("ranked.csv");
        fs::write(&input, "name,address,lat,lon\nA,서울,37.5,\n").unwrap();

        let err = run(&input, &output, &Origin::default(), false).unwrap_err();
        assert!(matches!(err, PipelineError::InvariantViolation { .. }));
        assert!(!output.exists());

        let err = run(
            &dir.path().join("absent.csv"),
            &output,
            &Origin::default(),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::SourceMissing { .. }));
    }
}
