//! Overpass JSON response parsing and geometry assembly.

use anyhow::{Context, Result};
use geo::Contains;
use geo_types::{Coord, Geometry, LineString, MultiPolygon, Point, Polygon};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::models::{FeatureRecord, OsmType};

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

/// One element of an Overpass `out geom` response.
///
/// Ways carry their node ids and an inline coordinate list in parallel
/// arrays; coordinate entries may be null when a node fell outside the
/// query region.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverpassElement {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: i64,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub nodes: Vec<i64>,
    #[serde(default)]
    pub geometry: Vec<Option<LatLon>>,
    #[serde(default)]
    pub members: Vec<OverpassMember>,
    #[serde(default)]
    pub tags: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverpassMember {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "ref")]
    pub member_ref: i64,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub geometry: Vec<Option<LatLon>>,
}

impl LatLon {
    fn coord(self) -> Coord<f64> {
        Coord {
            x: self.lon,
            y: self.lat,
        }
    }
}

/// Parse an Overpass response body into its raw elements.
pub fn parse_elements(body: &str) -> Result<Vec<OverpassElement>> {
    let response: OverpassResponse =
        serde_json::from_str(body).context("Failed to parse Overpass response")?;
    Ok(response.elements)
}

/// Parse an Overpass response body into feature records.
///
/// Elements whose geometry cannot be assembled still yield a record
/// with a null geometry; the load stage filters those.
pub fn parse_features(body: &str) -> Result<Vec<FeatureRecord>> {
    let elements = parse_elements(body)?;
    Ok(elements.iter().filter_map(feature_from_element).collect())
}

/// Convert one element to a feature record.
fn feature_from_element(element: &OverpassElement) -> Option<FeatureRecord> {
    let osm_type = match element.kind.as_str() {
        "node" => OsmType::Node,
        "way" => OsmType::Way,
        "relation" => OsmType::Relation,
        _ => return None,
    };

    let geometry = match osm_type {
        OsmType::Node => match (element.lon, element.lat) {
            (Some(lon), Some(lat)) => Some(Geometry::Point(Point::new(lon, lat))),
            _ => None,
        },
        OsmType::Way => way_geometry(element),
        OsmType::Relation => assemble_multipolygon(&element.members),
    };

    let mut record = FeatureRecord::new(osm_type, element.id, geometry);
    record.tags = element.tags.clone();
    Some(record)
}

fn way_coords(geometry: &[Option<LatLon>]) -> Vec<Coord<f64>> {
    geometry.iter().filter_map(|p| p.map(LatLon::coord)).collect()
}

/// Closed ways become polygons, open ways line strings.
fn way_geometry(element: &OverpassElement) -> Option<Geometry<f64>> {
    let coords = way_coords(&element.geometry);
    if coords.len() < 2 {
        return None;
    }
    if coords.len() >= 4 && coords.first() == coords.last() {
        Some(Geometry::Polygon(Polygon::new(
            LineString::new(coords),
            vec![],
        )))
    } else {
        Some(Geometry::LineString(LineString::new(coords)))
    }
}

/// Assemble a (multi)polygon from relation members.
///
/// Outer and inner member ways arrive as arbitrary open segments; they
/// are stitched into closed rings by matching endpoints, then inner
/// rings are attached to the outer polygon containing them.
fn assemble_multipolygon(members: &[OverpassMember]) -> Option<Geometry<f64>> {
    let mut outer_segments = Vec::new();
    let mut inner_segments = Vec::new();

    for member in members {
        if member.kind != "way" {
            continue;
        }
        let coords = way_coords(&member.geometry);
        if coords.len() < 2 {
            continue;
        }
        match member.role.as_str() {
            "outer" | "" => outer_segments.push(coords),
            "inner" => inner_segments.push(coords),
            _ => {}
        }
    }

    let outers = stitch_rings(outer_segments);
    if outers.is_empty() {
        return None;
    }
    let inners = stitch_rings(inner_segments);

    let mut polygons: Vec<Polygon<f64>> = outers
        .into_iter()
        .map(|ring| Polygon::new(ring, vec![]))
        .collect();

    for ring in inners {
        let Some(first) = ring.0.first().copied() else {
            continue;
        };
        let point = Point::from(first);
        if let Some(polygon) = polygons.iter_mut().find(|p| p.contains(&point)) {
            polygon.interiors_push(ring);
        }
    }

    if polygons.len() == 1 {
        polygons.pop().map(Geometry::Polygon)
    } else {
        Some(Geometry::MultiPolygon(MultiPolygon::new(polygons)))
    }
}

/// Stitch open segments into closed rings by endpoint matching.
fn stitch_rings(mut segments: Vec<Vec<Coord<f64>>>) -> Vec<LineString<f64>> {
    let mut rings = Vec::new();

    while let Some(mut current) = segments.pop() {
        let mut merged = true;
        while merged && !(current.len() >= 4 && current.first() == current.last()) {
            merged = false;
            for i in 0..segments.len() {
                let seg = &segments[i];
                if current.last() == seg.first() {
                    let mut seg = segments.remove(i);
                    seg.remove(0);
                    current.extend(seg);
                } else if current.last() == seg.last() {
                    let mut seg = segments.remove(i);
                    seg.reverse();
                    seg.remove(0);
                    current.extend(seg);
                } else if current.first() == seg.last() {
                    let mut seg = segments.remove(i);
                    seg.pop();
                    seg.extend(current);
                    current = seg;
                } else if current.first() == seg.first() {
                    let mut seg = segments.remove(i);
                    seg.reverse();
                    seg.pop();
                    seg.extend(current);
                    current = seg;
                } else {
                    continue;
                }
                merged = true;
                break;
            }
        }

        // Close the ring if possible
        if current.len() >= 3 {
            if current.first() != current.last() {
                current.push(current[0]);
            }
            if current.len() >= 4 {
                rings.push(LineString::new(current));
            }
        }
    }

    rings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(body: &str) -> Vec<FeatureRecord> {
        parse_features(body).unwrap()
    }

    #[test]
    fn test_node_becomes_point() {
        let records = sample(
            r#"{"elements":[{"type":"node","id":7,"lat":-33.61,"lon":-70.88,
                "tags":{"amenity":"cafe"}}]}"#,
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].osm_id, Some(7));
        assert_eq!(records[0].tag("amenity"), Some("cafe"));
        match records[0].geometry {
            Some(Geometry::Point(p)) => {
                assert_eq!(p.x(), -70.88);
                assert_eq!(p.y(), -33.61);
            }
            ref other => panic!("unexpected geometry {:?}", other),
        }
    }

    #[test]
    fn test_closed_way_becomes_polygon() {
        let records = sample(
            r#"{"elements":[{"type":"way","id":9,"nodes":[1,2,3,1],
                "geometry":[{"lat":0.0,"lon":0.0},{"lat":0.0,"lon":1.0},
                            {"lat":1.0,"lon":1.0},{"lat":0.0,"lon":0.0}],
                "tags":{"building":"yes"}}]}"#,
        );
        assert!(matches!(records[0].geometry, Some(Geometry::Polygon(_))));
    }

    #[test]
    fn test_open_way_becomes_linestring() {
        let records = sample(
            r#"{"elements":[{"type":"way","id":9,"nodes":[1,2],
                "geometry":[{"lat":0.0,"lon":0.0},{"lat":1.0,"lon":1.0}],
                "tags":{"highway":"residential"}}]}"#,
        );
        assert!(matches!(records[0].geometry, Some(Geometry::LineString(_))));
    }

    #[test]
    fn test_unresolvable_way_keeps_null_geometry() {
        let records = sample(
            r#"{"elements":[{"type":"way","id":9,"nodes":[1,2,3],
                "geometry":[{"lat":0.0,"lon":0.0},null,null],
                "tags":{"building":"yes"}}]}"#,
        );
        assert_eq!(records.len(), 1);
        assert!(records[0].geometry.is_none());
    }

    #[test]
    fn test_multipolygon_from_split_outer_segments() {
        let records = sample(
            r#"{"elements":[{"type":"relation","id":3,
                "members":[
                  {"type":"way","ref":10,"role":"outer",
                   "geometry":[{"lat":0.0,"lon":0.0},{"lat":0.0,"lon":2.0},{"lat":2.0,"lon":2.0}]},
                  {"type":"way","ref":11,"role":"outer",
                   "geometry":[{"lat":2.0,"lon":2.0},{"lat":2.0,"lon":0.0},{"lat":0.0,"lon":0.0}]}
                ],
                "tags":{"building":"yes","type":"multipolygon"}}]}"#,
        );
        match &records[0].geometry {
            Some(Geometry::Polygon(p)) => {
                assert!(p.exterior().0.len() >= 4);
                assert_eq!(p.exterior().0.first(), p.exterior().0.last());
            }
            other => panic!("unexpected geometry {:?}", other),
        }
    }

    #[test]
    fn test_multipolygon_inner_ring_attached() {
        let records = sample(
            r#"{"elements":[{"type":"relation","id":3,
                "members":[
                  {"type":"way","ref":10,"role":"outer",
                   "geometry":[{"lat":0.0,"lon":0.0},{"lat":0.0,"lon":4.0},
                               {"lat":4.0,"lon":4.0},{"lat":4.0,"lon":0.0},{"lat":0.0,"lon":0.0}]},
                  {"type":"way","ref":11,"role":"inner",
                   "geometry":[{"lat":1.0,"lon":1.0},{"lat":1.0,"lon":2.0},
                               {"lat":2.0,"lon":2.0},{"lat":1.0,"lon":1.0}]}
                ],
                "tags":{"building":"yes","type":"multipolygon"}}]}"#,
        );
        match &records[0].geometry {
            Some(Geometry::Polygon(p)) => assert_eq!(p.interiors().len(), 1),
            other => panic!("unexpected geometry {:?}", other),
        }
    }

    #[test]
    fn test_relation_without_ways_keeps_null_geometry() {
        let records = sample(
            r#"{"elements":[{"type":"relation","id":3,"members":[],
                "tags":{"building":"yes"}}]}"#,
        );
        assert!(records[0].geometry.is_none());
    }

    #[test]
    fn test_stitch_reversed_segment() {
        let a = Coord { x: 0.0, y: 0.0 };
        let b = Coord { x: 1.0, y: 0.0 };
        let c = Coord { x: 1.0, y: 1.0 };
        let d = Coord { x: 0.0, y: 1.0 };

        // Second segment runs the "wrong" direction: a -> d -> c.
        let rings = stitch_rings(vec![vec![a, b, c], vec![a, d, c]]);
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].0.first(), rings[0].0.last());
        assert_eq!(rings[0].0.len(), 5);
    }
}
