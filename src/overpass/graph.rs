//! Road network graph construction from Overpass way elements.
//!
//! Graph nodes are way endpoints plus nodes shared by two or more ways
//! (intersections); each way is split at graph nodes into edges that
//! keep the intermediate shape points as geometry.

use geo_types::{Coord, LineString};
use hashbrown::{HashMap, HashSet};

use crate::models::{GraphEdge, GraphNode, RoadNetwork};
use crate::overpass::parse::{LatLon, OverpassElement};

/// Build a road network from the ways of an Overpass response.
pub fn build_network(elements: &[OverpassElement]) -> RoadNetwork {
    let ways: Vec<&OverpassElement> = elements
        .iter()
        .filter(|e| e.kind == "way" && e.nodes.len() >= 2)
        .collect();

    // Count how many ways touch each node (distinct per way, so a
    // closed loop does not count its own endpoint twice).
    let mut occurrences: HashMap<i64, usize> = HashMap::new();
    for way in &ways {
        let distinct: HashSet<i64> = way.nodes.iter().copied().collect();
        for node in distinct {
            *occurrences.entry(node).or_insert(0) += 1;
        }
    }

    let mut network = RoadNetwork::default();

    for way in &ways {
        let pairs = node_coord_pairs(way);
        if pairs.len() < 2 {
            continue;
        }

        let highway = tag(way, "highway");
        let name = tag(way, "name");
        let oneway = matches!(
            tag(way, "oneway").as_deref(),
            Some("yes") | Some("true") | Some("1")
        );

        let mut segment: Vec<(i64, Coord<f64>)> = vec![pairs[0]];
        for (i, pair) in pairs.iter().enumerate().skip(1) {
            segment.push(*pair);
            let at_end = i == pairs.len() - 1;
            let splits = at_end || occurrences.get(&pair.0).copied().unwrap_or(0) >= 2;
            if !splits {
                continue;
            }

            let (u, u_coord) = segment[0];
            let (v, v_coord) = *pair;
            network.nodes.insert(
                u,
                GraphNode {
                    x: u_coord.x,
                    y: u_coord.y,
                },
            );
            network.nodes.insert(
                v,
                GraphNode {
                    x: v_coord.x,
                    y: v_coord.y,
                },
            );
            network.edges.push(GraphEdge {
                u,
                v,
                osm_id: way.id,
                highway: highway.clone(),
                name: name.clone(),
                oneway,
                geometry: LineString::new(segment.iter().map(|(_, c)| *c).collect()),
            });

            segment = vec![*pair];
        }
    }

    network
}

/// Zip a way's node ids with its inline coordinates, dropping entries
/// whose coordinate is null.
fn node_coord_pairs(way: &OverpassElement) -> Vec<(i64, Coord<f64>)> {
    way.nodes
        .iter()
        .zip(way.geometry.iter())
        .filter_map(|(&id, point)| {
            point.map(|LatLon { lat, lon }| (id, Coord { x: lon, y: lat }))
        })
        .collect()
}

fn tag(way: &OverpassElement, key: &str) -> Option<String> {
    way.tags.get(key).and_then(|v| v.as_str()).map(String::from)
}
