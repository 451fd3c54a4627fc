//! PostGIS store: schema DDL, bulk-replace loads, spatial indexes.

mod client;
mod load;

pub use client::{PgStore, INDEXED_TABLES, SCHEMA};
pub use load::{EdgeRow, FeatureRow};
