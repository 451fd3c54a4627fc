//! Load stage: raw files into PostGIS.
//!
//! Each layer follows the same path: skip with a warning if the raw
//! file is absent, otherwise read, reproject to the target CRS, drop
//! null geometries, derive layer-specific columns and bulk-replace the
//! table. A failure in one layer never blocks the others.

use std::path::{Path, PathBuf};

use anyhow::Result;
use geo::{Area, EuclideanLength, MapCoords};
use serde_json::Value;
use tracing::{error, info, warn};
use wkt::ToWkt;

use crate::crs::UtmProjection;
use crate::formats;
use crate::models::{Layer, NETWORK_FILE, NETWORK_TABLE};
use crate::postgis::{EdgeRow, FeatureRow, PgStore, SCHEMA};

/// Runs the load stage against one store.
pub struct Processor {
    store: PgStore,
    data_dir: PathBuf,
    projection: UtmProjection,
}

impl Processor {
    pub fn new(store: PgStore, data_dir: &Path, projection: UtmProjection) -> Self {
        Self {
            store,
            data_dir: data_dir.to_path_buf(),
            projection,
        }
    }

    /// Process every layer, then the network, then the spatial indexes.
    /// Per-layer failures are logged and isolated.
    pub async fn run(&self) -> Result<()> {
        for layer in Layer::all() {
            if let Err(e) = self.process_layer(*layer).await {
                error!("Error loading {}: {:#}", layer.table_name(), e);
            }
        }
        if let Err(e) = self.process_network().await {
            error!("Error loading {}: {:#}", NETWORK_TABLE, e);
        }
        self.store.create_spatial_indices().await;
        info!("Processing complete");
        Ok(())
    }

    async fn process_layer(&self, layer: Layer) -> Result<()> {
        let Some(rows) = prepare_layer(&self.data_dir, layer, &self.projection)? else {
            return Ok(());
        };
        let inserted = self
            .store
            .replace_feature_table(layer.table_name(), &rows, layer.derives_area())
            .await?;
        info!(
            "Table {}.{} created with {} rows",
            SCHEMA,
            layer.table_name(),
            inserted
        );
        Ok(())
    }

    async fn process_network(&self) -> Result<()> {
        let Some(rows) = prepare_network(&self.data_dir, &self.projection)? else {
            return Ok(());
        };
        let inserted = self.store.replace_edge_table(NETWORK_TABLE, &rows).await?;
        info!(
            "Table {}.{} created with {} rows",
            SCHEMA, NETWORK_TABLE, inserted
        );
        Ok(())
    }
}

/// Read, reproject and filter one feature layer.
///
/// Returns `None` (after one warning) when the raw file is absent; the
/// layer's table must then be left untouched.
pub fn prepare_layer(
    data_dir: &Path,
    layer: Layer,
    projection: &UtmProjection,
) -> Result<Option<Vec<FeatureRow>>> {
    let path = data_dir.join(layer.file_name());
    if !path.exists() {
        warn!("File {} not found. Skipping...", layer.file_name());
        return Ok(None);
    }

    let records = formats::geojson::read_features(&path)?;
    let total = records.len();

    let mut rows = Vec::new();
    for record in records {
        let Some(geometry) = record.geometry else {
            continue;
        };
        let projected = projection.project_geometry(&geometry);
        let area = layer.derives_area().then(|| projected.unsigned_area());
        rows.push(FeatureRow {
            osm_type: record.osm_type.map(|t| t.to_string()),
            osm_id: record.osm_id,
            tags: Value::Object(record.tags),
            area,
            geometry_wkt: projected.wkt_string(),
        });
    }

    if rows.len() < total {
        info!(
            "Dropped {} features without geometry from {}",
            total - rows.len(),
            layer.file_name()
        );
    }

    Ok(Some(rows))
}

/// Read the network graph, flatten it to edges, reproject and filter.
///
/// Returns `None` (after one warning) when the raw file is absent.
pub fn prepare_network(
    data_dir: &Path,
    projection: &UtmProjection,
) -> Result<Option<Vec<EdgeRow>>> {
    let path = data_dir.join(NETWORK_FILE);
    if !path.exists() {
        warn!("File {} not found. Skipping...", NETWORK_FILE);
        return Ok(None);
    }

    let network = formats::graphml::read_network(&path)?;

    let mut rows = Vec::new();
    for edge in network.edges {
        if edge.geometry.0.len() < 2 {
            continue;
        }
        let projected = edge.geometry.map_coords(|c| projection.project(c));
        rows.push(EdgeRow {
            u: edge.u,
            v: edge.v,
            osm_id: edge.osm_id,
            highway: edge.highway,
            name: edge.name,
            oneway: edge.oneway,
            length: projected.euclidean_length(),
            geometry_wkt: projected.wkt_string(),
        });
    }

    Ok(Some(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::TARGET_EPSG;
    use crate::models::{FeatureRecord, GraphEdge, GraphNode, OsmType, RoadNetwork};
    use geo_types::{Geometry, LineString, Point, Polygon};
    use serde_json::json;

    fn projection() -> UtmProjection {
        UtmProjection::from_epsg(TARGET_EPSG).unwrap()
    }

    #[test]
    fn test_missing_file_skips_layer() {
        let dir = tempfile::tempdir().unwrap();
        let result = prepare_layer(dir.path(), Layer::Amenities, &projection()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_missing_network_file_skips() {
        let dir = tempfile::tempdir().unwrap();
        let result = prepare_network(dir.path(), &projection()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_buildings_gain_area_and_lose_null_geometry() {
        let dir = tempfile::tempdir().unwrap();

        // ~100m x ~100m square near Peñaflor.
        let square = Polygon::new(
            LineString::from(vec![
                (-70.88, -33.61),
                (-70.8789, -33.61),
                (-70.8789, -33.6091),
                (-70.88, -33.6091),
                (-70.88, -33.61),
            ]),
            vec![],
        );
        let mut good = FeatureRecord::new(OsmType::Way, 1, Some(Geometry::Polygon(square)));
        good.tags.insert("building".to_string(), json!("yes"));
        let broken = FeatureRecord::new(OsmType::Way, 2, None);

        let path = dir.path().join(Layer::Buildings.file_name());
        formats::geojson::write_features(&path, &[good, broken]).unwrap();

        let rows = prepare_layer(dir.path(), Layer::Buildings, &projection())
            .unwrap()
            .unwrap();

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.osm_type.as_deref(), Some("way"));
        assert_eq!(row.osm_id, Some(1));
        assert!(row.geometry_wkt.starts_with("POLYGON"));

        // Roughly a hectare, in projected square meters.
        let area = row.area.unwrap();
        assert!(area > 5_000.0 && area < 20_000.0, "area {}", area);
    }

    #[test]
    fn test_amenities_have_no_area_column() {
        let dir = tempfile::tempdir().unwrap();

        let mut cafe = FeatureRecord::new(
            OsmType::Node,
            7,
            Some(Geometry::Point(Point::new(-70.88, -33.61))),
        );
        cafe.tags.insert("amenity".to_string(), json!("cafe"));

        let path = dir.path().join(Layer::Amenities.file_name());
        formats::geojson::write_features(&path, &[cafe]).unwrap();

        let rows = prepare_layer(dir.path(), Layer::Amenities, &projection())
            .unwrap()
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].area.is_none());
        assert!(rows[0].geometry_wkt.starts_with("POINT"));
    }

    #[test]
    fn test_layer_coordinates_are_projected() {
        let dir = tempfile::tempdir().unwrap();

        let point = FeatureRecord::new(
            OsmType::Node,
            7,
            Some(Geometry::Point(Point::new(-70.88, -33.61))),
        );
        let path = dir.path().join(Layer::Amenities.file_name());
        formats::geojson::write_features(&path, &[point]).unwrap();

        let rows = prepare_layer(dir.path(), Layer::Amenities, &projection())
            .unwrap()
            .unwrap();

        // UTM 19S coordinates, not lon/lat.
        let wkt = &rows[0].geometry_wkt;
        assert!(!wkt.contains("-70."), "wkt {}", wkt);
        assert!(!wkt.contains("-33."), "wkt {}", wkt);
    }

    #[test]
    fn test_network_edges_projected_with_length() {
        let dir = tempfile::tempdir().unwrap();

        let mut network = RoadNetwork::default();
        network.nodes.insert(10, GraphNode { x: -70.88, y: -33.61 });
        network
            .nodes
            .insert(11, GraphNode { x: -70.879, y: -33.61 });
        network.edges.push(GraphEdge {
            u: 10,
            v: 11,
            osm_id: 99,
            highway: Some("residential".to_string()),
            name: None,
            oneway: false,
            geometry: LineString::from(vec![(-70.88, -33.61), (-70.879, -33.61)]),
        });
        // An edge with unusable geometry is dropped.
        network.edges.push(GraphEdge {
            u: 11,
            v: 12,
            osm_id: 100,
            highway: None,
            name: None,
            oneway: false,
            geometry: LineString::new(vec![]),
        });

        let path = dir.path().join(NETWORK_FILE);
        formats::graphml::write_network(&path, &network).unwrap();

        let rows = prepare_network(dir.path(), &projection()).unwrap().unwrap();
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!((row.u, row.v), (10, 11));
        assert!(row.geometry_wkt.starts_with("LINESTRING"));
        // ~0.001 degrees of longitude at this latitude is ~90 meters.
        assert!(row.length > 50.0 && row.length < 150.0, "length {}", row.length);
    }

    #[test]
    fn test_only_buildings_present_prepares_one_layer() {
        let dir = tempfile::tempdir().unwrap();

        let building = FeatureRecord::new(
            OsmType::Way,
            1,
            Some(Geometry::Point(Point::new(-70.88, -33.61))),
        );
        let path = dir.path().join(Layer::Buildings.file_name());
        formats::geojson::write_features(&path, &[building]).unwrap();

        let mut prepared = 0;
        for layer in Layer::all() {
            if prepare_layer(dir.path(), *layer, &projection())
                .unwrap()
                .is_some()
            {
                prepared += 1;
            }
        }
        assert_eq!(prepared, 1);
        assert!(prepare_network(dir.path(), &projection()).unwrap().is_none());
    }
}
