//! Arrayan - a municipal geodata pipeline over OpenStreetMap and PostGIS
//!
//! This library provides shared types and modules for the fetch and process binaries.

pub mod config;
pub mod crs;
pub mod fetcher;
pub mod formats;
pub mod manifest;
pub mod models;
pub mod overpass;
pub mod postgis;
pub mod processor;
pub mod wfs;

pub use config::Config;
pub use models::{FeatureRecord, Layer, OsmType, RoadNetwork};
