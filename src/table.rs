//! CSV interchange for the pipeline tables.
//!
//! Columns are looked up by header name, so extra columns in hand-edited
//! files are ignored and missing optional columns read as empty text.
//! Every table is written to a temp file next to its destination and renamed
//! into place, so readers never observe a half-written table.

use csv::{ReaderBuilder, StringRecord, Writer};
use std::collections::HashMap;
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::models::store::{format_flag, parse_flag};
use crate::models::{GeoPoint, GeocodedStore, RankedStore, StoreRecord};

pub const STORE_COLUMNS: [&str; 9] = [
    "name",
    "category",
    "address",
    "phone",
    "opening_hours",
    "nearest_station",
    "review_score",
    "materials",
    "is_key_store",
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Header name to column position
struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Self {
        let mut index = HashMap::new();
        for (i, header) in headers.iter().enumerate() {
            let name = header.trim_start_matches('\u{feff}').trim().to_string();
            index.entry(name).or_insert(i);
        }
        Self { index }
    }

    fn require(&self, path: &Path, column: &'static str) -> Result<(), PipelineError> {
        if self.index.contains_key(column) {
            Ok(())
        } else {
            Err(PipelineError::MissingColumn {
                path: path.to_path_buf(),
                column,
            })
        }
    }

    fn get<'r>(&self, record: &'r StringRecord, column: &str) -> &'r str {
        self.index
            .get(column)
            .and_then(|&i| record.get(i))
            .unwrap_or("")
    }
}

fn open_reader(path: &Path) -> Result<(csv::Reader<File>, Columns), PipelineError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => PipelineError::SourceMissing {
            path: path.to_path_buf(),
        },
        _ => PipelineError::Io(e),
    })?;

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);
    let columns = Columns::from_headers(reader.headers()?);
    Ok((reader, columns))
}

fn store_from_record(columns: &Columns, record: &StringRecord) -> StoreRecord {
    StoreRecord {
        name: columns.get(record, "name").to_string(),
        category: columns.get(record, "category").to_string(),
        address: columns.get(record, "address").to_string(),
        phone: columns.get(record, "phone").to_string(),
        opening_hours: columns.get(record, "opening_hours").to_string(),
        nearest_station: columns.get(record, "nearest_station").to_string(),
        review_score: columns.get(record, "review_score").to_string(),
        materials: columns.get(record, "materials").to_string(),
        is_key_store: parse_flag(columns.get(record, "is_key_store")),
    }
}

fn store_fields(store: &StoreRecord) -> [&str; 9] {
    [
        &store.name,
        &store.category,
        &store.address,
        &store.phone,
        &store.opening_hours,
        &store.nearest_station,
        &store.review_score,
        &store.materials,
        format_flag(store.is_key_store),
    ]
}

fn parse_number(row: usize, column: &str, value: &str) -> Result<f64, PipelineError> {
    let parsed: f64 = value
        .trim()
        .parse()
        .map_err(|_| PipelineError::InvariantViolation {
            row,
            reason: format!("{} '{}' is not numeric", column, value),
        })?;

    if !parsed.is_finite() {
        return Err(PipelineError::InvariantViolation {
            row,
            reason: format!("{} '{}' is not finite", column, value),
        });
    }
    Ok(parsed)
}

fn point_from_record(
    columns: &Columns,
    record: &StringRecord,
    row: usize,
) -> Result<GeoPoint, PipelineError> {
    let lat = parse_number(row, "lat", columns.get(record, "lat"))?;
    let lon = parse_number(row, "lon", columns.get(record, "lon"))?;
    let point = GeoPoint::new(lat, lon);

    if !point.is_valid() {
        return Err(PipelineError::InvariantViolation {
            row,
            reason: format!("coordinate ({}, {}) is out of range", lat, lon),
        });
    }
    Ok(point)
}

/// Load the raw store list. Only the `address` column is mandatory.
pub fn read_raw_stores(path: &Path) -> Result<Vec<StoreRecord>, PipelineError> {
    let (mut reader, columns) = open_reader(path)?;
    columns.require(path, "address")?;

    let mut stores = Vec::new();
    for result in reader.records() {
        let record = result?;
        stores.push(store_from_record(&columns, &record));
    }

    info!("Loaded {} raw stores from {}", stores.len(), path.display());
    Ok(stores)
}

/// Load the coordinate-enriched table. Any row without a usable coordinate
/// is an upstream contract breach and fails the whole read.
pub fn read_geocoded_stores(path: &Path) -> Result<Vec<GeocodedStore>, PipelineError> {
    let (mut reader, columns) = open_reader(path)?;
    columns.require(path, "lat")?;
    columns.require(path, "lon")?;

    let mut stores = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result?;
        let point = point_from_record(&columns, &record, i + 1)?;
        stores.push(GeocodedStore {
            store: store_from_record(&columns, &record),
            point,
        });
    }

    info!(
        "Loaded {} geocoded stores from {}",
        stores.len(),
        path.display()
    );
    Ok(stores)
}

pub fn read_ranked_stores(path: &Path) -> Result<Vec<RankedStore>, PipelineError> {
    let (mut reader, columns) = open_reader(path)?;
    for column in ["lat", "lon", "distance_km"] {
        columns.require(path, column)?;
    }

    let mut stores = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result?;
        let row = i + 1;
        let point = point_from_record(&columns, &record, row)?;
        let distance_km = parse_number(row, "distance_km", columns.get(&record, "distance_km"))?;
        if distance_km < 0.0 {
            return Err(PipelineError::InvariantViolation {
                row,
                reason: format!("distance_km {} is negative", distance_km),
            });
        }

        stores.push(RankedStore {
            store: store_from_record(&columns, &record),
            point,
            distance_km,
        });
    }

    info!("Loaded {} ranked stores from {}", stores.len(), path.display());
    Ok(stores)
}

pub fn write_geocoded_stores(
    path: &Path,
    stores: &[GeocodedStore],
    bom: bool,
) -> Result<(), PipelineError> {
    write_atomic(path, bom, |writer| {
        writer.write_record(STORE_COLUMNS.iter().chain(&["lat", "lon"]))?;
        for store in stores {
            let lat = store.point.lat.to_string();
            let lon = store.point.lon.to_string();
            writer.write_record(
                store_fields(&store.store)
                    .into_iter()
                    .chain([lat.as_str(), lon.as_str()]),
            )?;
        }
        Ok(())
    })?;

    info!("Wrote {} geocoded stores to {}", stores.len(), path.display());
    Ok(())
}

/// Distances are written with full precision; rounding is a display concern.
pub fn write_ranked_stores(
    path: &Path,
    stores: &[RankedStore],
    bom: bool,
) -> Result<(), PipelineError> {
    write_atomic(path, bom, |writer| {
        writer.write_record(STORE_COLUMNS.iter().chain(&["lat", "lon", "distance_km"]))?;
        for store in stores {
            let lat = store.point.lat.to_string();
            let lon = store.point.lon.to_string();
            let distance = store.distance_km.to_string();
            writer.write_record(
                store_fields(&store.store)
                    .into_iter()
                    .chain([lat.as_str(), lon.as_str(), distance.as_str()]),
            )?;
        }
        Ok(())
    })?;

    info!("Wrote {} ranked stores to {}", stores.len(), path.display());
    Ok(())
}

/// Write a table through a temp file in the destination directory, then
/// rename it over `path`. On any error the destination is left untouched.
pub(crate) fn write_atomic<F>(path: &Path, bom: bool, fill: F) -> Result<(), PipelineError>
where
    F: FnOnce(&mut Writer<&mut NamedTempFile>) -> Result<(), csv::Error>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = Builder::new()
        .prefix(".storefinder-")
        .suffix(".csv.tmp")
        .tempfile_in(dir)?;

    if bom {
        tmp.write_all(UTF8_BOM)?;
    }
    {
        let mut writer = Writer::from_writer(&mut tmp);
        fill(&mut writer)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;

    debug!("Renaming {} to {}", tmp.path().display(), path.display());
    tmp.persist(path).map_err(|e| PipelineError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}
