//! Raw feature records exchanged between the fetch and load stages.

use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Type of OSM object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsmType {
    Node,
    Way,
    Relation,
}

impl std::fmt::Display for OsmType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OsmType::Node => write!(f, "node"),
            OsmType::Way => write!(f, "way"),
            OsmType::Relation => write!(f, "relation"),
        }
    }
}

impl std::str::FromStr for OsmType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "node" => Ok(OsmType::Node),
            "way" => Ok(OsmType::Way),
            "relation" => Ok(OsmType::Relation),
            other => Err(format!("unknown osm type: {}", other)),
        }
    }
}

/// A single raw feature as fetched from a source service.
///
/// The geometry is optional on ingest: a source element whose geometry
/// could not be assembled still produces a record. Consumers must filter
/// null geometries before use. OSM identity is absent on features that
/// did not come from OSM (the WFS boundary layer).
#[derive(Debug, Clone)]
pub struct FeatureRecord {
    pub osm_type: Option<OsmType>,
    pub osm_id: Option<i64>,

    /// Non-geometric attributes (OSM tags or WFS properties)
    pub tags: Map<String, Value>,

    /// Feature geometry, if one could be assembled
    pub geometry: Option<Geometry<f64>>,
}

impl FeatureRecord {
    /// Create an OSM-sourced record with empty tags
    pub fn new(osm_type: OsmType, osm_id: i64, geometry: Option<Geometry<f64>>) -> Self {
        Self {
            osm_type: Some(osm_type),
            osm_id: Some(osm_id),
            tags: Map::new(),
            geometry,
        }
    }

    /// Get a tag value as a string slice
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_osm_type_roundtrip() {
        for (t, s) in [
            (OsmType::Node, "node"),
            (OsmType::Way, "way"),
            (OsmType::Relation, "relation"),
        ] {
            assert_eq!(t.to_string(), s);
            assert_eq!(s.parse::<OsmType>().unwrap(), t);
        }
        assert!("area".parse::<OsmType>().is_err());
    }
}
