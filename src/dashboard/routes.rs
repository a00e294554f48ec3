//! HTTP handlers over the ranked table.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

use storefinder::display::{
    display_distance, marker_color, MarkerColor, COLUMN_LABELS, EMPTY_MESSAGE,
    UNKNOWN_ORIGIN_MESSAGE,
};
use storefinder::filter::{self, MaterialMode, StoreFilter};
use storefinder::geocoder::LandmarkResolver;
use storefinder::models::{GeoPoint, Origin, RankedStore};

/// Application state shared across handlers. Never mutated after startup.
pub struct AppState {
    pub stores: Vec<RankedStore>,
    pub origin: Origin,
    pub landmarks: LandmarkResolver,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/facets", get(facets_handler))
        .route("/v1/stores", get(stores_handler))
        .route("/v1/stores/{name}", get(store_detail_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    stores: usize,
}

/// Health check endpoint
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        stores: state.stores.len(),
    })
}

#[derive(Serialize)]
pub struct FacetsResponse {
    categories: Vec<String>,
    materials: Vec<String>,
    /// Result table column keys and their labels
    columns: &'static [(&'static str, &'static str)],
}

/// Choices for the category and material pickers
pub async fn facets_handler(State(state): State<Arc<AppState>>) -> Json<FacetsResponse> {
    Json(FacetsResponse {
        categories: filter::categories(&state.stores),
        materials: filter::materials(&state.stores),
        columns: &COLUMN_LABELS,
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct StoresQueryParams {
    /// Exact category or "전체"
    category: Option<String>,
    /// Materials separated by ';' or ','
    materials: Option<String>,
    mode: Option<MaterialMode>,
    /// Distance cutoff in km
    max_km: Option<f64>,
    /// Starting point typed by the user
    origin: Option<String>,
    origin_lat: Option<f64>,
    origin_lon: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct OriginInfo {
    name: String,
    lat: f64,
    lon: f64,
    /// Distances were recomputed from a user-supplied point
    alternate: bool,
}

#[derive(Debug, Serialize)]
pub struct StoreRow {
    rank: usize,
    name: String,
    category: String,
    review_score: Option<f64>,
    nearest_station: String,
    address: String,
    lat: f64,
    lon: f64,
    /// Full precision, from the pipeline origin or the alternate one
    distance_km: f64,
    /// `distance_km` rounded for the table
    display_distance_km: f64,
    is_key_store: bool,
    marker_color: MarkerColor,
}

#[derive(Debug, Serialize)]
pub struct StoresResponse {
    origin: OriginInfo,
    count: usize,
    stores: Vec<StoreRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    empty_message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<&'static str>,
}

type ApiError = (StatusCode, String);

fn bad_request(message: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, message.into())
}

/// Filtered, ranked store list
pub async fn stores_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StoresQueryParams>,
) -> Result<Json<StoresResponse>, ApiError> {
    if let Some(max) = params.max_km {
        if !max.is_finite() || max < 0.0 {
            return Err(bad_request(format!("max_km must be a non-negative number, got {max}")));
        }
    }

    let mut warning = None;
    let alternate = match (params.origin_lat, params.origin_lon, params.origin.as_deref()) {
        (Some(lat), Some(lon), text) => {
            let point = GeoPoint::new(lat, lon);
            if !point.is_valid() {
                return Err(bad_request(format!("origin ({lat}, {lon}) is out of range")));
            }
            Some((text.unwrap_or("사용자 지정").to_string(), point))
        }
        (Some(_), None, _) | (None, Some(_), _) => {
            return Err(bad_request("origin_lat and origin_lon must be given together"));
        }
        (None, None, Some(text)) if !text.trim().is_empty() => {
            match state.landmarks.lookup(text) {
                Some(point) => Some((text.to_string(), point)),
                None => {
                    debug!("Unknown origin text: {}", text);
                    warning = Some(UNKNOWN_ORIGIN_MESSAGE);
                    None
                }
            }
        }
        _ => None,
    };

    let store_filter = StoreFilter {
        category: params.category,
        materials: params
            .materials
            .as_deref()
            .map(filter::parse_materials)
            .unwrap_or_default(),
        mode: params.mode.unwrap_or_default(),
        max_km: params.max_km,
        origin: alternate.as_ref().map(|(_, point)| *point),
    };

    let rows: Vec<StoreRow> = store_filter
        .apply(&state.stores)
        .into_iter()
        .enumerate()
        .map(|(i, m)| {
            let store = &m.store.store;
            StoreRow {
                rank: i + 1,
                name: store.name.clone(),
                category: store.category.clone(),
                review_score: store.review_score(),
                nearest_station: store.nearest_station.clone(),
                address: store.address.clone(),
                lat: m.store.point.lat,
                lon: m.store.point.lon,
                distance_km: m.distance_km,
                display_distance_km: display_distance(m.distance_km),
                is_key_store: store.is_key_store,
                marker_color: marker_color(m.distance_km, store.is_key_store),
            }
        })
        .collect();

    let origin = match alternate {
        Some((name, point)) => OriginInfo {
            name,
            lat: point.lat,
            lon: point.lon,
            alternate: true,
        },
        None => OriginInfo {
            name: state.origin.name.clone(),
            lat: state.origin.lat,
            lon: state.origin.lon,
            alternate: false,
        },
    };

    Ok(Json(StoresResponse {
        origin,
        count: rows.len(),
        empty_message: rows.is_empty().then_some(EMPTY_MESSAGE),
        stores: rows,
        warning,
    }))
}

#[derive(Debug, Serialize)]
pub struct StoreDetail {
    name: String,
    category: String,
    address: String,
    phone: String,
    opening_hours: String,
    nearest_station: String,
    review_score: String,
    materials: Vec<String>,
    is_key_store: bool,
    lat: f64,
    lon: f64,
    distance_km: f64,
    display_distance_km: f64,
}

/// Detail view of a single store, by name
pub async fn store_detail_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<StoreDetail>, ApiError> {
    let ranked = state
        .stores
        .iter()
        .find(|s| s.store.name == name)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("no store named '{name}'")))?;
    let store = &ranked.store;

    Ok(Json(StoreDetail {
        name: store.name.clone(),
        category: store.category.clone(),
        address: store.address.clone(),
        phone: store.phone.clone(),
        opening_hours: store.opening_hours.clone(),
        nearest_station: store.nearest_station.clone(),
        review_score: store.review_score.clone(),
        materials: store.materials().map(String::from).collect(),
        is_key_store: store.is_key_store,
        lat: ranked.point.lat,
        lon: ranked.point.lon,
        distance_km: ranked.distance_km,
        display_distance_km: display_distance(ranked.distance_km),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefinder::models::StoreRecord;
    use storefinder::ranking::rank_stores;
    use storefinder::GeocodedStore;

    fn state() -> Arc<AppState> {
        let raw = [
            ("시청 화방", "화방", "수채화;오일파스텔", true, 37.5665, 126.978),
            ("홍대 문구", "문구", "수채화", false, 37.5574, 126.9248),
            ("강남 화방", "화방", "오일파스텔;아크릴", false, 37.4979, 127.0276),
        ];
        let stores = raw
            .iter()
            .map(|&(name, category, materials, key, lat, lon)| GeocodedStore {
                store: StoreRecord {
                    name: name.to_string(),
                    category: category.to_string(),
                    materials: materials.to_string(),
                    is_key_store: key,
                    ..Default::default()
                },
                point: GeoPoint::new(lat, lon),
            })
            .collect();
        let origin = Origin::default();

        Arc::new(AppState {
            stores: rank_stores(stores, &origin).unwrap(),
            origin,
            landmarks: LandmarkResolver::seoul(),
        })
    }

    async fn query(params: StoresQueryParams) -> StoresResponse {
        stores_handler(State(state()), Query(params)).await.unwrap().0
    }

    fn names(response: &StoresResponse) -> Vec<&str> {
        response.stores.iter().map(|s| s.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_unfiltered_keeps_ranked_order() {
        let response = query(StoresQueryParams {
            category: Some("전체".to_string()),
            ..Default::default()
        })
        .await;

        assert_eq!(names(&response), vec!["시청 화방", "홍대 문구", "강남 화방"]);
        assert_eq!(response.stores[0].display_distance_km, 2.74);
        assert!((response.stores[0].distance_km - 2.7428).abs() < 1e-3);
        assert_ne!(response.stores[0].distance_km, 2.74);
        assert_eq!(response.stores[0].marker_color, MarkerColor::Blue);
        assert_eq!(response.stores[1].marker_color, MarkerColor::DarkGreen);
        assert!(!response.origin.alternate);
        assert!(response.empty_message.is_none());
    }

    #[tokio::test]
    async fn test_material_modes() {
        let all = query(StoresQueryParams {
            materials: Some("수채화;오일파스텔".to_string()),
            ..Default::default()
        })
        .await;
        assert_eq!(names(&all), vec!["시청 화방"]);

        let any = query(StoresQueryParams {
            materials: Some("아크릴,수채화".to_string()),
            mode: Some(MaterialMode::Any),
            ..Default::default()
        })
        .await;
        assert_eq!(names(&any), vec!["시청 화방", "홍대 문구", "강남 화방"]);
    }

    #[tokio::test]
    async fn test_landmark_origin_reranks() {
        let response = query(StoresQueryParams {
            origin: Some("강남역 근처".to_string()),
            max_km: Some(5.0),
            ..Default::default()
        })
        .await;

        assert!(response.origin.alternate);
        assert_eq!(response.origin.lat, 37.4979);
        assert_eq!(names(&response), vec!["강남 화방"]);
        assert_eq!(response.stores[0].distance_km, 0.0);
    }

    #[tokio::test]
    async fn test_unknown_origin_warns_and_falls_back() {
        let response = query(StoresQueryParams {
            origin: Some("부산역".to_string()),
            ..Default::default()
        })
        .await;

        assert_eq!(response.warning, Some(UNKNOWN_ORIGIN_MESSAGE));
        assert!(!response.origin.alternate);
        assert_eq!(response.count, 3);
    }

    #[tokio::test]
    async fn test_empty_result_has_message() {
        let response = query(StoresQueryParams {
            category: Some("목공".to_string()),
            ..Default::default()
        })
        .await;

        assert_eq!(response.count, 0);
        assert_eq!(response.empty_message, Some(EMPTY_MESSAGE));
    }

    #[tokio::test]
    async fn test_bad_parameters_rejected() {
        let err = stores_handler(
            State(state()),
            Query(StoresQueryParams {
                max_km: Some(-1.0),
                ..Default::default()
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        let err = stores_handler(
            State(state()),
            Query(StoresQueryParams {
                origin_lat: Some(37.5),
                ..Default::default()
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_detail() {
        let detail = store_detail_handler(State(state()), Path("강남 화방".to_string()))
            .await
            .unwrap()
            .0;
        assert_eq!(detail.materials, vec!["오일파스텔", "아크릴"]);
        assert_eq!(detail.category, "화방");
        assert!((detail.distance_km - 9.6462).abs() < 1e-3);
        assert_eq!(detail.display_distance_km, 9.65);

        let err = store_detail_handler(State(state()), Path("없는 가게".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_facets() {
        let facets = facets_handler(State(state())).await.0;
        assert_eq!(facets.categories, vec!["전체", "화방", "문구"]);
        assert_eq!(facets.materials, vec!["수채화", "아크릴", "오일파스텔"]);
        assert_eq!(facets.columns[0], ("name", "화방 이름"));
    }
}
