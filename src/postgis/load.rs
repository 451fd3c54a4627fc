//! Batched bulk inserts for the load stage.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use sqlx::{Postgres, Transaction};

use crate::crs::TARGET_EPSG;
use crate::postgis::client::SCHEMA;

/// Rows per INSERT statement.
const BATCH_SIZE: usize = 500;

/// A feature row ready for insertion (already projected and filtered).
#[derive(Debug, Clone)]
pub struct FeatureRow {
    pub osm_type: Option<String>,
    pub osm_id: Option<i64>,
    pub tags: serde_json::Value,
    /// Planar area in square meters; set only for layers that derive it
    pub area: Option<f64>,
    pub geometry_wkt: String,
}

/// A road edge row ready for insertion.
#[derive(Debug, Clone)]
pub struct EdgeRow {
    pub u: i64,
    pub v: i64,
    pub osm_id: i64,
    pub highway: Option<String>,
    pub name: Option<String>,
    pub oneway: bool,
    /// Planar length in meters
    pub length: f64,
    pub geometry_wkt: String,
}

pub(crate) async fn insert_feature_rows(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    rows: &[FeatureRow],
    with_area: bool,
) -> Result<()> {
    let columns = if with_area {
        "osm_type, osm_id, tags, area, geometry"
    } else {
        "osm_type, osm_id, tags, geometry"
    };
    let width = if with_area { 5 } else { 4 };

    let bar = progress_bar(rows.len());
    for batch in rows.chunks(BATCH_SIZE) {
        let sql = format!(
            "INSERT INTO {}.{} ({}) VALUES {}",
            SCHEMA,
            table,
            columns,
            placeholders(batch.len(), width)
        );
        let mut query = sqlx::query(&sql);
        for row in batch {
            query = query
                .bind(row.osm_type.clone())
                .bind(row.osm_id)
                .bind(row.tags.clone());
            if with_area {
                query = query.bind(row.area);
            }
            query = query.bind(row.geometry_wkt.clone());
        }
        query
            .execute(&mut **tx)
            .await
            .with_context(|| format!("Bulk insert into {} failed", table))?;
        bar.inc(batch.len() as u64);
    }
    bar.finish_and_clear();
    Ok(())
}

pub(crate) async fn insert_edge_rows(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    rows: &[EdgeRow],
) -> Result<()> {
    let bar = progress_bar(rows.len());
    for batch in rows.chunks(BATCH_SIZE) {
        let sql = format!(
            "INSERT INTO {}.{} (u, v, osm_id, highway, name, oneway, length, geometry) VALUES {}",
            SCHEMA,
            table,
            placeholders(batch.len(), 8)
        );
        let mut query = sqlx::query(&sql);
        for row in batch {
            query = query
                .bind(row.u)
                .bind(row.v)
                .bind(row.osm_id)
                .bind(row.highway.clone())
                .bind(row.name.clone())
                .bind(row.oneway)
                .bind(row.length)
                .bind(row.geometry_wkt.clone());
        }
        query
            .execute(&mut **tx)
            .await
            .with_context(|| format!("Bulk insert into {} failed", table))?;
        bar.inc(batch.len() as u64);
    }
    bar.finish_and_clear();
    Ok(())
}

/// Placeholder tuples with the trailing geometry bound through
/// ST_GeomFromText in the target SRID.
fn placeholders(rows: usize, width: usize) -> String {
    let mut out = String::new();
    let mut n = 1;
    for i in 0..rows {
        if i > 0 {
            out.push_str(", ");
        }
        out.push('(');
        for j in 0..width {
            if j > 0 {
                out.push_str(", ");
            }
            if j == width - 1 {
                out.push_str(&format!("ST_GeomFromText(${}, {})", n, TARGET_EPSG));
            } else {
                out.push_str(&format!("${}", n));
            }
            n += 1;
        }
        out.push(')');
    }
    out
}

fn progress_bar(len: usize) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    bar
}
