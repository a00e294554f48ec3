//! Offline lookup over a fixed table of well-known places.

use crate::error::ResolveError;
use crate::models::GeoPoint;

use super::Resolver;

/// Resolves text by substring match against a small landmark table.
#[derive(Debug, Clone, Default)]
pub struct LandmarkResolver {
    entries: Vec<(String, GeoPoint)>,
}

impl LandmarkResolver {
    pub fn new(entries: Vec<(String, GeoPoint)>) -> Self {
        Self { entries }
    }

    /// Subway stations commonly typed as a starting point in Seoul
    pub fn seoul() -> Self {
        Self::new(vec![
            ("강남역".to_string(), GeoPoint::new(37.4979, 127.0276)),
            ("홍대입구역".to_string(), GeoPoint::new(37.5574, 126.9248)),
            ("혜화역".to_string(), GeoPoint::new(37.582236, 127.001967)),
        ])
    }

    pub fn insert(&mut self, name: impl Into<String>, point: GeoPoint) {
        self.entries.push((name.into(), point));
    }

    /// First landmark whose name occurs in `text`
    pub fn lookup(&self, text: &str) -> Option<GeoPoint> {
        self.entries
            .iter()
            .find(|(name, _)| text.contains(name.as_str()))
            .map(|(_, point)| *point)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Resolver for LandmarkResolver {
    async fn resolve(&self, address: &str) -> Result<Option<GeoPoint>, ResolveError> {
        Ok(self.lookup(address))
    }
}
