//! PostGIS client wrapper.

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{error, info};

use crate::crs::TARGET_EPSG;
use crate::postgis::load::{insert_edge_rows, insert_feature_rows, EdgeRow, FeatureRow};

/// Schema holding every pipeline table.
pub const SCHEMA: &str = "raw_data";

/// Tables that receive a spatial index after every processing run.
pub const INDEXED_TABLES: &[&str] = &[
    "osm_buildings",
    "osm_amenities",
    "comuna_boundaries",
    "osm_network",
];

/// PostGIS connection with the pipeline schema ensured.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and make sure the raw_data schema exists.
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to PostGIS...");
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(url)
            .await
            .context("Failed to connect to PostGIS")?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", SCHEMA))
            .execute(&self.pool)
            .await
            .context("Failed to create schema")?;
        info!("Schema {} verified", SCHEMA);
        Ok(())
    }

    /// Drop and recreate a feature table, loading all rows in one
    /// transaction. No merge semantics: the previous table is gone.
    pub async fn replace_feature_table(
        &self,
        table: &str,
        rows: &[FeatureRow],
        with_area: bool,
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!("DROP TABLE IF EXISTS {}.{}", SCHEMA, table))
            .execute(&mut *tx)
            .await?;

        let area_column = if with_area {
            "area DOUBLE PRECISION,\n                "
        } else {
            ""
        };
        sqlx::query(&format!(
            "CREATE TABLE {schema}.{table} (\n\
                osm_type TEXT,\n\
                osm_id BIGINT,\n\
                tags JSONB,\n\
                {area}geometry geometry(Geometry, {srid}) NOT NULL\n\
            )",
            schema = SCHEMA,
            table = table,
            area = area_column,
            srid = TARGET_EPSG,
        ))
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to create table {}", table))?;

        insert_feature_rows(&mut tx, table, rows, with_area).await?;
        tx.commit().await?;
        Ok(rows.len())
    }

    /// Drop and recreate the road edge table.
    pub async fn replace_edge_table(&self, table: &str, rows: &[EdgeRow]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!("DROP TABLE IF EXISTS {}.{}", SCHEMA, table))
            .execute(&mut *tx)
            .await?;

        sqlx::query(&format!(
            "CREATE TABLE {schema}.{table} (\n\
                u BIGINT,\n\
                v BIGINT,\n\
                osm_id BIGINT,\n\
                highway TEXT,\n\
                name TEXT,\n\
                oneway BOOLEAN,\n\
                length DOUBLE PRECISION,\n\
                geometry geometry(LineString, {srid}) NOT NULL\n\
            )",
            schema = SCHEMA,
            table = table,
            srid = TARGET_EPSG,
        ))
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to create table {}", table))?;

        insert_edge_rows(&mut tx, table, rows).await?;
        tx.commit().await?;
        Ok(rows.len())
    }

    /// Issue a create-spatial-index statement for every pipeline table.
    ///
    /// All statements are attempted regardless of which tables exist; a
    /// failure is logged per table and does not block the others.
    pub async fn create_spatial_indices(&self) {
        info!("Creating spatial indices...");
        for table in INDEXED_TABLES {
            let statement = format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_geom \
                 ON {schema}.{table} USING GIST (geometry)",
                schema = SCHEMA,
                table = table,
            );
            match sqlx::query(&statement).execute(&self.pool).await {
                Ok(_) => info!("Spatial index ensured for {}", table),
                Err(e) => error!("Error creating index on {}: {}", table, e),
            }
        }
    }
}
