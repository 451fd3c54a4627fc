//! GraphML interchange for the road network.
//!
//! Nodes carry `x`/`y` (WGS84 lon/lat); edges carry `osmid`,
//! `highway`, `name`, `oneway` and a WKT `geometry` attribute with the
//! full segment shape. The reader tolerates missing attributes: an edge
//! without stored geometry falls back to a straight line between its
//! endpoints.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use geo_types::{Coord, LineString};
use hashbrown::HashMap;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use wkt::{ToWkt, TryFromWkt};

use crate::models::{GraphEdge, GraphNode, RoadNetwork};

const GRAPHML_NS: &str = "http://graphml.graphdrawing.org/xmlns";

/// Declared attribute keys: (id, element, type).
const KEYS: &[(&str, &str, &str)] = &[
    ("x", "node", "double"),
    ("y", "node", "double"),
    ("osmid", "edge", "long"),
    ("highway", "edge", "string"),
    ("name", "edge", "string"),
    ("oneway", "edge", "boolean"),
    ("geometry", "edge", "string"),
];

/// Write the network as a GraphML document.
pub fn write_network(path: &Path, network: &RoadNetwork) -> Result<()> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut graphml = BytesStart::new("graphml");
    graphml.push_attribute(("xmlns", GRAPHML_NS));
    writer.write_event(Event::Start(graphml))?;

    for (id, target, attr_type) in KEYS {
        let mut key = BytesStart::new("key");
        key.push_attribute(("id", *id));
        key.push_attribute(("for", *target));
        key.push_attribute(("attr.name", *id));
        key.push_attribute(("attr.type", *attr_type));
        writer.write_event(Event::Empty(key))?;
    }

    let mut graph = BytesStart::new("graph");
    graph.push_attribute(("edgedefault", "undirected"));
    writer.write_event(Event::Start(graph))?;

    for (id, node) in &network.nodes {
        let id = id.to_string();
        let mut el = BytesStart::new("node");
        el.push_attribute(("id", id.as_str()));
        writer.write_event(Event::Start(el))?;
        write_data(&mut writer, "x", &node.x.to_string())?;
        write_data(&mut writer, "y", &node.y.to_string())?;
        writer.write_event(Event::End(BytesEnd::new("node")))?;
    }

    for edge in &network.edges {
        let source = edge.u.to_string();
        let target = edge.v.to_string();
        let mut el = BytesStart::new("edge");
        el.push_attribute(("source", source.as_str()));
        el.push_attribute(("target", target.as_str()));
        writer.write_event(Event::Start(el))?;
        write_data(&mut writer, "osmid", &edge.osm_id.to_string())?;
        if let Some(highway) = &edge.highway {
            write_data(&mut writer, "highway", highway)?;
        }
        if let Some(name) = &edge.name {
            write_data(&mut writer, "name", name)?;
        }
        write_data(&mut writer, "oneway", if edge.oneway { "true" } else { "false" })?;
        write_data(&mut writer, "geometry", &edge.geometry.wkt_string())?;
        writer.write_event(Event::End(BytesEnd::new("edge")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("graph")))?;
    writer.write_event(Event::End(BytesEnd::new("graphml")))?;

    fs::write(path, writer.into_inner())
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn write_data(writer: &mut Writer<Vec<u8>>, key: &str, value: &str) -> Result<()> {
    let mut el = BytesStart::new("data");
    el.push_attribute(("key", key));
    writer.write_event(Event::Start(el))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new("data")))?;
    Ok(())
}

enum Element {
    Node {
        id: i64,
        attrs: HashMap<String, String>,
    },
    Edge {
        source: i64,
        target: i64,
        attrs: HashMap<String, String>,
    },
}

/// Read a GraphML document back into a road network.
pub fn read_network(path: &Path) -> Result<RoadNetwork> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut reader = Reader::from_str(&content);
    let mut network = RoadNetwork::default();

    // key id -> attribute name
    let mut keys: HashMap<String, String> = HashMap::new();
    let mut current: Option<Element> = None;
    let mut data_key: Option<String> = None;
    let mut data_value = String::new();

    loop {
        match reader.read_event().context("Malformed GraphML")? {
            Event::Empty(ref e) => match e.name().as_ref() {
                b"key" => register_key(e, &mut keys)?,
                // Self-closed elements carry no data children.
                b"node" => {
                    let id = required_attr(e, "id")?.parse().context("Bad node id")?;
                    finish_element(
                        Element::Node {
                            id,
                            attrs: HashMap::new(),
                        },
                        &mut network,
                    );
                }
                b"edge" => {
                    let source = required_attr(e, "source")?.parse().context("Bad edge source")?;
                    let target = required_attr(e, "target")?.parse().context("Bad edge target")?;
                    finish_element(
                        Element::Edge {
                            source,
                            target,
                            attrs: HashMap::new(),
                        },
                        &mut network,
                    );
                }
                _ => {}
            },
            Event::Start(ref e) => match e.name().as_ref() {
                b"key" => register_key(e, &mut keys)?,
                b"node" => {
                    let id = required_attr(e, "id")?.parse().context("Bad node id")?;
                    current = Some(Element::Node {
                        id,
                        attrs: HashMap::new(),
                    });
                }
                b"edge" => {
                    let source = required_attr(e, "source")?.parse().context("Bad edge source")?;
                    let target = required_attr(e, "target")?.parse().context("Bad edge target")?;
                    current = Some(Element::Edge {
                        source,
                        target,
                        attrs: HashMap::new(),
                    });
                }
                b"data" => {
                    data_key = attr(e, "key")?;
                    data_value.clear();
                }
                _ => {}
            },
            Event::Text(t) => {
                if data_key.is_some() {
                    data_value.push_str(&t.unescape()?);
                }
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"data" => {
                    if let (Some(key), Some(element)) = (data_key.take(), current.as_mut()) {
                        let name = keys.get(&key).cloned().unwrap_or(key);
                        let attrs = match element {
                            Element::Node { attrs, .. } => attrs,
                            Element::Edge { attrs, .. } => attrs,
                        };
                        attrs.insert(name, std::mem::take(&mut data_value));
                    }
                }
                b"node" | b"edge" => {
                    if let Some(element) = current.take() {
                        finish_element(element, &mut network);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(network)
}

fn finish_element(element: Element, network: &mut RoadNetwork) {
    match element {
        Element::Node { id, attrs } => {
            let x = attrs.get("x").and_then(|v| v.parse().ok());
            let y = attrs.get("y").and_then(|v| v.parse().ok());
            if let (Some(x), Some(y)) = (x, y) {
                network.nodes.insert(id, GraphNode { x, y });
            }
        }
        Element::Edge {
            source,
            target,
            attrs,
        } => {
            let geometry = attrs
                .get("geometry")
                .and_then(|w| LineString::try_from_wkt_str(w).ok())
                .unwrap_or_else(|| endpoint_line(network, source, target));
            network.edges.push(GraphEdge {
                u: source,
                v: target,
                osm_id: attrs
                    .get("osmid")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0),
                highway: attrs.get("highway").cloned(),
                name: attrs.get("name").cloned(),
                oneway: attrs.get("oneway").map(|v| v == "true").unwrap_or(false),
                geometry,
            });
        }
    }
}

/// Straight line between edge endpoints, or empty if either is unknown.
fn endpoint_line(network: &RoadNetwork, source: i64, target: i64) -> LineString<f64> {
    match (network.nodes.get(&source), network.nodes.get(&target)) {
        (Some(u), Some(v)) => LineString::new(vec![
            Coord { x: u.x, y: u.y },
            Coord { x: v.x, y: v.y },
        ]),
        _ => LineString::new(vec![]),
    }
}

fn attr(e: &BytesStart, name: &str) -> Result<Option<String>> {
    Ok(e.try_get_attribute(name)
        .context("Bad attribute")?
        .map(|a| a.unescape_value())
        .transpose()
        .context("Bad attribute value")?
        .map(|v| v.into_owned()))
}

fn required_attr(e: &BytesStart, name: &str) -> Result<String> {
    attr(e, name)?.with_context(|| format!("Missing {} attribute", name))
}

fn register_key(e: &BytesStart, keys: &mut HashMap<String, String>) -> Result<()> {
    if let (Some(id), Some(name)) = (attr(e, "id")?, attr(e, "attr.name")?) {
        keys.insert(id, name);
    }
    Ok(())
}
