//! In-memory geospatial exploration workspace.
//!
//! `geolake` loads a world-countries GeoJSON dataset and OpenStreetMap
//! Overpass API results into an embedded DuckDB instance, runs spatial SQL
//! against it, and exposes the results as panel state plus map viewport
//! commands for a downstream renderer.
//!
//! The engine, the Overpass service, and the map renderer are all opaque
//! external services; the crate's own job is orchestration: the one-time
//! base dataset load, the per-panel query/parameter/render cycle, and the
//! two-stage external ingestion feeding the choropleth join.

pub mod app;
pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod loader;
pub mod map;
pub mod osm;
pub mod overpass;
pub mod panel;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;
