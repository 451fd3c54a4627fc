//! Fetch stage: external sources into the raw data directory.
//!
//! Every sub-fetch is independent and best-effort: a failure is logged
//! and leaves its output file absent, and the remaining fetches still
//! run. The manifest is written last, whatever the individual outcomes.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::config::Config;
use crate::formats;
use crate::manifest::Manifest;
use crate::models::{Layer, NETWORK_FILE};
use crate::overpass::OverpassClient;
use crate::wfs::WfsClient;

const SOURCES: &[&str] = &["OpenStreetMap", "IDE Chile"];

/// Runs the fetch stage for one comuna.
pub struct Fetcher {
    overpass: OverpassClient,
    wfs: WfsClient,
    comuna: String,
    output_dir: PathBuf,
}

impl Fetcher {
    /// Create the fetcher and its output directory.
    pub fn new(config: &Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("Failed to create output directory {}", config.data_dir.display())
        })?;
        info!("Initializing fetch for comuna: {}", config.comuna);

        Ok(Self {
            overpass: OverpassClient::new(config),
            wfs: WfsClient::new(config),
            comuna: config.comuna.clone(),
            output_dir: config.data_dir.clone(),
        })
    }

    /// Run all sub-fetches, then write the manifest.
    ///
    /// Output files are always overwritten; there is no incremental
    /// fetch.
    pub async fn run(&self) -> Result<()> {
        if let Err(e) = self.fetch_network().await {
            error!("Error fetching road network: {:#}", e);
        }
        if let Err(e) = self.fetch_buildings().await {
            error!("Error fetching buildings: {:#}", e);
        }
        if let Err(e) = self.fetch_amenities().await {
            error!("Error fetching amenities: {:#}", e);
        }
        if let Err(e) = self.fetch_boundaries().await {
            error!("Error fetching boundaries: {:#}", e);
        }
        self.write_manifest()?;
        Ok(())
    }

    async fn fetch_network(&self) -> Result<()> {
        info!("Fetching road network from OSM...");
        let network = self.overpass.fetch_network().await?;
        let path = self.output_dir.join(NETWORK_FILE);
        formats::graphml::write_network(&path, &network)?;
        info!("Road network saved to {}", path.display());
        Ok(())
    }

    async fn fetch_buildings(&self) -> Result<()> {
        info!("Fetching buildings...");
        let records = self.overpass.fetch_features("building").await?;
        let path = self.output_dir.join(Layer::Buildings.file_name());
        formats::geojson::write_features(&path, &records)?;
        info!("Buildings saved to {}", path.display());
        Ok(())
    }

    async fn fetch_amenities(&self) -> Result<()> {
        info!("Fetching amenities...");
        let records = self.overpass.fetch_features("amenity").await?;
        let path = self.output_dir.join(Layer::Amenities.file_name());
        formats::geojson::write_features(&path, &records)?;
        info!("Amenities saved to {}", path.display());
        Ok(())
    }

    async fn fetch_boundaries(&self) -> Result<()> {
        info!("Fetching administrative boundaries...");
        match self.wfs.fetch_boundaries(&self.comuna).await? {
            Some(body) => {
                let path = self.output_dir.join(Layer::Boundaries.file_name());
                fs::write(&path, body)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!("Boundaries saved to {}", path.display());
            }
            // Non-success status: already logged, no file written.
            None => {}
        }
        Ok(())
    }

    fn write_manifest(&self) -> Result<()> {
        let manifest = Manifest::capture(&self.comuna, SOURCES, &self.output_dir)?;
        manifest.write(&self.output_dir)?;
        info!("Manifest saved to {}", self.output_dir.join(crate::manifest::MANIFEST_FILE).display());
        Ok(())
    }
}
