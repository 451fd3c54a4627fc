//! Fetch pipeline.
//!
//! Downloads the road network, buildings and amenities from OSM and the
//! administrative boundary from the WFS service for the configured
//! comuna, then writes the run manifest.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use arrayan::config::Config;
use arrayan::fetcher::Fetcher;

#[derive(Parser, Debug)]
#[command(name = "fetch")]
#[command(about = "Download geodata for the configured comuna")]
struct Args {
    /// Output directory for raw files
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Municipality name (overrides COMUNA_NAME)
    #[arg(long)]
    comuna: Option<String>,
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
    if let Some(comuna) = args.comuna {
        config.comuna = comuna;
    }

    info!("Arrayan fetch pipeline");
    info!("Comuna: {}", config.comuna);

    let fetcher = Fetcher::new(&config)?;
    fetcher.run().await?;

    info!("Fetch complete");
    Ok(())
}
