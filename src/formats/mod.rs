//! Interchange file codecs for the raw data directory.

pub mod geojson;
pub mod graphml;
