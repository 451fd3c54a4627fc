//! GeoJSON interchange files.
//!
//! Features keep their OSM identity in the `@osm_type` / `@osm_id`
//! properties so a file round-trips losslessly. Features with a null
//! geometry are preserved by the codec; filtering them is the load
//! stage's job.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use geojson::{Feature, FeatureCollection, GeoJson};
use serde_json::Value;

use crate::models::FeatureRecord;

const OSM_TYPE_KEY: &str = "@osm_type";
const OSM_ID_KEY: &str = "@osm_id";

/// Write records as a GeoJSON FeatureCollection.
pub fn write_features(path: &Path, records: &[FeatureRecord]) -> Result<()> {
    let collection = FeatureCollection {
        bbox: None,
        features: records.iter().map(to_feature).collect(),
        foreign_members: None,
    };
    fs::write(path, GeoJson::from(collection).to_string())
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Read a GeoJSON file back into feature records.
pub fn read_features(path: &Path) -> Result<Vec<FeatureRecord>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let geojson: GeoJson = content
        .parse()
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let features = match geojson {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(geometry) => vec![Feature {
            bbox: None,
            geometry: Some(geometry),
            id: None,
            properties: None,
            foreign_members: None,
        }],
    };

    features.into_iter().map(from_feature).collect()
}

fn to_feature(record: &FeatureRecord) -> Feature {
    let mut properties = record.tags.clone();
    if let Some(osm_type) = record.osm_type {
        properties.insert(OSM_TYPE_KEY.to_string(), Value::String(osm_type.to_string()));
    }
    if let Some(osm_id) = record.osm_id {
        properties.insert(OSM_ID_KEY.to_string(), Value::from(osm_id));
    }

    Feature {
        bbox: None,
        geometry: record
            .geometry
            .as_ref()
            .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn from_feature(feature: Feature) -> Result<FeatureRecord> {
    let mut tags = feature.properties.unwrap_or_default();
    let osm_type = tags
        .remove(OSM_TYPE_KEY)
        .and_then(|v| v.as_str().and_then(|s| s.parse().ok()));
    let osm_id = tags.remove(OSM_ID_KEY).and_then(|v| v.as_i64());

    let geometry = feature
        .geometry
        .map(|g| geo_types::Geometry::<f64>::try_from(g.value))
        .transpose()
        .context("Unsupported GeoJSON geometry")?;

    Ok(FeatureRecord {
        osm_type,
        osm_id,
        tags,
        geometry,
    })
}
