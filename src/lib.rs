//! Store Finder - geocode a store list, rank it by distance from a fixed
//! origin, and serve filtered views of the ranked table.
//!
//! This library provides shared types and modules for the geocode, rank and
//! dashboard binaries.

pub mod config;
pub mod display;
pub mod error;
pub mod filter;
pub mod geocoder;
pub mod models;
pub mod ranking;
pub mod table;

pub use error::{PipelineError, ResolveError};
pub use models::{GeoPoint, GeocodedStore, Origin, RankedStore, StoreRecord};
