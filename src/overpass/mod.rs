//! Overpass API fetch: features and the road network.

mod client;
mod graph;
mod parse;

pub use client::OverpassClient;
pub use graph::build_network;
pub use parse::{parse_elements, parse_features, LatLon, OverpassElement, OverpassMember};
