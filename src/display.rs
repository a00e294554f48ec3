//! Presentation helpers for the dashboard. Pure functions of a ranked row.

use serde::Serialize;

/// Shown when a filter leaves nothing to display
pub const EMPTY_MESSAGE: &str = "선택된 조건에 맞는 화방이 없습니다. 필터를 조정해 주세요.";

/// Shown when a typed starting point cannot be placed
pub const UNKNOWN_ORIGIN_MESSAGE: &str =
    "위치 정보를 정확히 파악할 수 없습니다. 지도 표시가 부정확할 수 있습니다.";

/// Display labels for the result table
pub const COLUMN_LABELS: [(&str, &str); 5] = [
    ("name", "화방 이름"),
    ("category", "카테고리"),
    ("review_score", "평점"),
    ("nearest_station", "가까운 역"),
    ("distance_km", "거리 (km)"),
];

/// Upper bounds (km) of the near and mid distance buckets
const NEAR_KM: f64 = 3.0;
const MID_KM: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerColor {
    /// Key stores, regardless of distance
    Blue,
    Green,
    DarkGreen,
    Gray,
}

pub fn marker_color(distance_km: f64, is_key_store: bool) -> MarkerColor {
    if is_key_store {
        MarkerColor::Blue
    } else if distance_km <= NEAR_KM {
        MarkerColor::Green
    } else if distance_km <= MID_KM {
        MarkerColor::DarkGreen
    } else {
        MarkerColor::Gray
    }
}

/// Round to two decimals for the table; the stored value keeps full precision.
pub fn display_distance(distance_km: f64) -> f64 {
    (distance_km * 100.0).round() / 100.0
}
