//! Feature layer descriptors for the load stage.

/// A fetched feature layer and its database destination.
///
/// The Loader iterates these uniformly instead of hand-writing one
/// method per layer: each variant knows its raw file name, its target
/// table in the `raw_data` schema, and whether a planar area column is
/// derived after reprojection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    /// Building footprints
    Buildings,
    /// Amenity points of interest
    Amenities,
    /// Administrative boundary polygons
    Boundaries,
}

impl Layer {
    /// All feature layers in processing order
    pub fn all() -> &'static [Layer] {
        &[Layer::Buildings, Layer::Amenities, Layer::Boundaries]
    }

    /// File name of the raw artifact in the data directory
    pub fn file_name(&self) -> &'static str {
        match self {
            Layer::Buildings => "osm_buildings.geojson",
            Layer::Amenities => "osm_amenities.geojson",
            Layer::Boundaries => "comuna_boundaries.geojson",
        }
    }

    /// Target table name in the raw_data schema
    pub fn table_name(&self) -> &'static str {
        match self {
            Layer::Buildings => "osm_buildings",
            Layer::Amenities => "osm_amenities",
            Layer::Boundaries => "comuna_boundaries",
        }
    }

    /// Whether the layer gains a computed planar area column
    pub fn derives_area(&self) -> bool {
        matches!(self, Layer::Buildings)
    }
}
