//! Read-only filtering over the ranked table, as the dashboard applies it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::{GeoPoint, RankedStore};
use crate::ranking::great_circle_km;

/// Category choice that disables category filtering
pub const ALL_CATEGORIES: &str = "전체";

/// How selected materials combine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialMode {
    /// Store must carry every selected material
    #[default]
    All,
    /// Store must carry at least one selected material
    Any,
}

#[derive(Debug, Clone, Default)]
pub struct StoreFilter {
    /// Exact category, or `None` / [`ALL_CATEGORIES`] for everything
    pub category: Option<String>,
    pub materials: Vec<String>,
    pub mode: MaterialMode,
    pub max_km: Option<f64>,
    /// Alternate origin; distances are recomputed from here when set
    pub origin: Option<GeoPoint>,
}

/// A store that passed the filter, with the distance the filter used
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match<'a> {
    pub store: &'a RankedStore,
    pub distance_km: f64,
}

impl StoreFilter {
    pub fn matches_category(&self, store: &RankedStore) -> bool {
        match self.category.as_deref() {
            None | Some(ALL_CATEGORIES) | Some("") => true,
            Some(category) => store.store.category == category,
        }
    }

    pub fn matches_materials(&self, store: &RankedStore) -> bool {
        if self.materials.is_empty() {
            return true;
        }
        match self.mode {
            MaterialMode::All => self.materials.iter().all(|m| store.store.has_material(m)),
            MaterialMode::Any => self.materials.iter().any(|m| store.store.has_material(m)),
        }
    }

    /// Filter `stores` without reordering them, unless an alternate origin
    /// is set, in which case the result is re-ranked by the new distance.
    pub fn apply<'a>(&self, stores: &'a [RankedStore]) -> Vec<Match<'a>> {
        let mut matches: Vec<Match<'a>> = stores
            .iter()
            .filter(|s| self.matches_category(s) && self.matches_materials(s))
            .map(|store| Match {
                store,
                distance_km: match self.origin {
                    Some(origin) => great_circle_km(origin, store.point),
                    None => store.distance_km,
                },
            })
            .filter(|m| self.max_km.map_or(true, |max| m.distance_km <= max))
            .collect();

        if self.origin.is_some() {
            matches.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        }
        matches
    }
}

/// Split a user-supplied material list on `;` or `,`.
pub fn parse_materials(input: &str) -> Vec<String> {
    input
        .split([';', ','])
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from)
        .collect()
}

/// Category choices: "all" first, then categories in first-seen order.
pub fn categories(stores: &[RankedStore]) -> Vec<String> {
    let mut out = vec![ALL_CATEGORIES.to_string()];
    for store in stores {
        let category = &store.store.category;
        if !category.is_empty() && !out.contains(category) {
            out.push(category.clone());
        }
    }
    out
}

/// Every distinct material token, sorted
pub fn materials(stores: &[RankedStore]) -> Vec<String> {
    stores
        .iter()
        .flat_map(|s| s.store.materials())
        .map(String::from)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
