//! Core data models for the pipeline.

pub mod feature;
pub mod layer;
pub mod network;

pub use feature::{FeatureRecord, OsmType};
pub use layer::Layer;
pub use network::{GraphEdge, GraphNode, RoadNetwork, NETWORK_FILE, NETWORK_TABLE};
