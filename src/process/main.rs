//! Process pipeline.
//!
//! Loads the raw fetched files into PostGIS: reprojects every layer to
//! the target CRS, drops null geometries, derives computed columns and
//! bulk-replaces the tables in the raw_data schema, then ensures the
//! spatial indexes.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use arrayan::config::Config;
use arrayan::crs::{UtmProjection, TARGET_EPSG};
use arrayan::postgis::PgStore;
use arrayan::processor::Processor;

#[derive(Parser, Debug)]
#[command(name = "process")]
#[command(about = "Load fetched geodata into PostGIS")]
struct Args {
    /// Directory holding the raw files
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Database URL (overrides POSTGRES_* variables)
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = Config::from_env();
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    let database_url = args.database_url.unwrap_or_else(|| config.database.url());

    info!("Arrayan process pipeline");
    info!("Data directory: {}", config.data_dir.display());

    // Without a store connection nothing can proceed; per-layer
    // failures later are isolated instead.
    let store = PgStore::connect(&database_url)
        .await
        .context("Cannot reach the database")?;

    let projection = UtmProjection::from_epsg(TARGET_EPSG)?;
    let processor = Processor::new(store, &config.data_dir, projection);
    processor.run().await?;

    Ok(())
}
