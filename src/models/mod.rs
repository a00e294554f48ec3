//! Core data models for the store finder pipeline.

pub mod store;

pub use store::{GeoPoint, GeocodedStore, Origin, RankedStore, StoreRecord};
