//! Address resolution stage.
//!
//! Each raw store is resolved independently through a [`Resolver`]. A failed
//! lookup only drops that store; the batch always runs to the end.

mod landmarks;
mod nominatim;

pub use landmarks::LandmarkResolver;
pub use nominatim::NominatimResolver;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{PipelineError, ResolveError};
use crate::models::{GeoPoint, GeocodedStore, StoreRecord};
use crate::table;

/// Turns a free-text address into a coordinate.
///
/// `Ok(None)` means the service answered but had no match; `Err` is reserved
/// for failures of the lookup itself.
pub trait Resolver {
    fn resolve(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Option<GeoPoint>, ResolveError>>;

    /// Wait until the service may be asked again. Awaited before the
    /// per-lookup timeout starts, so queueing never counts as a timeout.
    fn wait_turn(&self) -> impl Future<Output = ()> {
        async {}
    }
}

#[derive(Debug, Clone)]
pub struct GeocodeOptions {
    /// Upper bound for a single lookup
    pub timeout: Duration,
    /// Maximum outstanding lookups
    pub concurrency: usize,
}

impl Default for GeocodeOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            concurrency: 1,
        }
    }
}

/// Why a store was dropped
#[derive(Debug)]
pub enum UnresolvedCause {
    EmptyAddress,
    NotFound,
    Failed(ResolveError),
}

impl fmt::Display for UnresolvedCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnresolvedCause::EmptyAddress => write!(f, "empty address"),
            UnresolvedCause::NotFound => write!(f, "no match"),
            UnresolvedCause::Failed(e) => write!(f, "{}", e),
        }
    }
}

#[derive(Debug)]
pub struct Unresolved {
    /// 1-based data row in the raw table
    pub row: usize,
    pub name: String,
    pub address: String,
    pub cause: UnresolvedCause,
    pub logged_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct GeocodeOutcome {
    pub input_count: usize,
    /// Resolved stores in input order
    pub resolved: Vec<GeocodedStore>,
    pub unresolved: Vec<Unresolved>,
}

impl GeocodeOutcome {
    pub fn dropped(&self) -> usize {
        self.input_count - self.resolved.len()
    }
}

async fn resolve_one<R: Resolver>(
    resolver: &R,
    address: &str,
    timeout: Duration,
) -> Result<GeoPoint, UnresolvedCause> {
    let address = address.trim();
    if address.is_empty() {
        return Err(UnresolvedCause::EmptyAddress);
    }

    resolver.wait_turn().await;
    match tokio::time::timeout(timeout, resolver.resolve(address)).await {
        Err(_) => Err(UnresolvedCause::Failed(ResolveError::Timeout(timeout))),
        Ok(Err(e)) => Err(UnresolvedCause::Failed(e)),
        Ok(Ok(None)) => Err(UnresolvedCause::NotFound),
        Ok(Ok(Some(point))) if point.is_valid() => Ok(point),
        Ok(Ok(Some(point))) => Err(UnresolvedCause::Failed(
            ResolveError::InvalidCoordinate {
                lat: point.lat,
                lon: point.lon,
            },
        )),
    }
}

/// Row number, store, outcome, and when the outcome was known
type Lookup = (
    usize,
    StoreRecord,
    Result<GeoPoint, UnresolvedCause>,
    DateTime<Utc>,
);

/// Resolve every store, keeping input order among the resolved ones.
pub async fn geocode_stores<R: Resolver>(
    stores: Vec<StoreRecord>,
    resolver: &R,
    options: &GeocodeOptions,
    progress: &ProgressBar,
) -> GeocodeOutcome {
    let input_count = stores.len();

    let results: Vec<Lookup> =
        stream::iter(stores.into_iter().enumerate())
            .map(|(i, store)| async move {
                let result = resolve_one(resolver, &store.address, options.timeout).await;
                progress.inc(1);
                (i + 1, store, result, Utc::now())
            })
            .buffered(options.concurrency.max(1))
            .collect()
            .await;

    let mut outcome = GeocodeOutcome {
        input_count,
        ..Default::default()
    };

    for (row, store, result, finished_at) in results {
        match result {
            Ok(point) => outcome.resolved.push(GeocodedStore { store, point }),
            Err(cause) => {
                warn!(
                    "Row {}: could not resolve '{}' ({}): {}",
                    row, store.address, store.name, cause
                );
                outcome.unresolved.push(Unresolved {
                    row,
                    name: store.name,
                    address: store.address,
                    cause,
                    logged_at: finished_at,
                });
            }
        }
    }

    outcome
}

pub fn write_unresolved(
    path: &Path,
    unresolved: &[Unresolved],
    bom: bool,
) -> Result<(), PipelineError> {
    table::write_atomic(path, bom, |writer| {
        writer.write_record(["row", "name", "address", "reason", "logged_at"])?;
        for entry in unresolved {
            writer.write_record([
                entry.row.to_string(),
                entry.name.clone(),
                entry.address.clone(),
                entry.cause.to_string(),
                entry.logged_at.to_rfc3339(),
            ])?;
        }
        Ok(())
    })
}

/// Summary of a finished geocoding run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeocodeReport {
    pub input: usize,
    pub resolved: usize,
    pub dropped: usize,
}

/// Run the whole stage: raw table in, coordinate table and unresolved log out.
///
/// Nothing is written when the raw table cannot be read.
pub async fn run<R: Resolver>(
    config: &Config,
    resolver: &R,
    progress: &ProgressBar,
) -> Result<GeocodeReport, PipelineError> {
    let stores = table::read_raw_stores(&config.paths.raw)?;
    progress.set_length(stores.len() as u64);

    let options = GeocodeOptions {
        timeout: config.geocoder.timeout(),
        concurrency: config.geocoder.concurrency,
    };
    let outcome = geocode_stores(stores, resolver, &options, progress).await;

    let bom = config.output.write_bom;
    // Log first: a failed log write must not leave a fresh coordinate table behind.
    write_unresolved(&config.paths.unresolved, &outcome.unresolved, bom)?;
    table::write_geocoded_stores(&config.paths.geocoded, &outcome.resolved, bom)?;

    let report = GeocodeReport {
        input: outcome.input_count,
        resolved: outcome.resolved.len(),
        dropped: outcome.dropped(),
    };
    info!(
        "Geocoded {}/{} stores, {} dropped (see {})",
        report.resolved,
        report.input,
        report.dropped,
        config.paths.unresolved.display()
    );
    Ok(report)
}
