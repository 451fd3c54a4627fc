//! Overpass API client.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::{debug, info};

use crate::config::Config;
use crate::models::{FeatureRecord, RoadNetwork};
use crate::overpass::graph::build_network;
use crate::overpass::parse::{parse_elements, parse_features};

const QUERY_TIMEOUT_SECS: u64 = 180;

/// Fetches features and the road network for one administrative area.
pub struct OverpassClient {
    client: Client,
    endpoint: String,
    comuna: String,
}

impl OverpassClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::builder()
                .user_agent("Arrayan/0.1 (municipal geodata pipeline)")
                .timeout(Duration::from_secs(QUERY_TIMEOUT_SECS + 30))
                .build()
                .expect("Failed to create HTTP client"),
            endpoint: config.overpass_url.clone(),
            comuna: config.comuna.clone(),
        }
    }

    /// Fetch every feature carrying `tag` inside the comuna.
    pub async fn fetch_features(&self, tag: &str) -> Result<Vec<FeatureRecord>> {
        let query = self.feature_query(tag);
        let body = self.execute(&query).await?;
        let records = parse_features(&body)?;
        info!("Fetched {} '{}' features", records.len(), tag);
        Ok(records)
    }

    /// Fetch the road network inside the comuna.
    pub async fn fetch_network(&self) -> Result<RoadNetwork> {
        let query = self.network_query();
        let body = self.execute(&query).await?;
        let network = build_network(&parse_elements(&body)?);
        info!(
            "Built road network: {} nodes, {} edges",
            network.node_count(),
            network.edge_count()
        );
        Ok(network)
    }

    async fn execute(&self, query: &str) -> Result<String> {
        debug!("Overpass query:\n{}", query);

        let response = self
            .client
            .post(&self.endpoint)
            .form(&[("data", query)])
            .send()
            .await
            .context("Overpass request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Overpass query failed with status {}", response.status());
        }

        response.text().await.context("Failed to read Overpass response")
    }

    /// Query selecting nodes, ways and multipolygon relations with `tag`.
    fn feature_query(&self, tag: &str) -> String {
        format!(
            "[out:json][timeout:{timeout}];\n\
             {area}\n\
             (\n\
               node[\"{tag}\"](area.a);\n\
               way[\"{tag}\"](area.a);\n\
               relation[\"{tag}\"][\"type\"=\"multipolygon\"](area.a);\n\
             );\n\
             out geom;",
            timeout = QUERY_TIMEOUT_SECS,
            area = self.area_clause(),
            tag = tag,
        )
    }

    /// Query selecting all highway ways.
    fn network_query(&self) -> String {
        format!(
            "[out:json][timeout:{timeout}];\n\
             {area}\n\
             way[\"highway\"](area.a);\n\
             out geom;",
            timeout = QUERY_TIMEOUT_SECS,
            area = self.area_clause(),
        )
    }

    fn area_clause(&self) -> String {
        format!(
            "area[\"name\"=\"{}\"][\"boundary\"=\"administrative\"]->.a;",
            self.comuna.replace('\\', "\\\\").replace('"', "\\\"")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DbConfig;
    use std::path::PathBuf;

    fn test_client(comuna: &str) -> OverpassClient {
        let config = Config {
            comuna: comuna.to_string(),
            data_dir: PathBuf::from("data/raw"),
            overpass_url: "http://localhost/api".to_string(),
            wfs_url: "http://localhost/wfs".to_string(),
            database: DbConfig {
                user: String::new(),
                password: String::new(),
                host: "localhost".to_string(),
                port: 5432,
                database: String::new(),
            },
        };
        OverpassClient::new(&config)
    }

    #[test]
    fn test_feature_query_scopes_to_area() {
        let client = test_client("Peñaflor");
        let query = client.feature_query("building");
        assert!(query.contains("area[\"name\"=\"Peñaflor\"]"));
        assert!(query.contains("way[\"building\"](area.a);"));
        assert!(query.contains("out geom;"));
    }

    #[test]
    fn test_area_clause_escapes_quotes() {
        let client = test_client("San \"Pedro\"");
        assert!(client.area_clause().contains("San \\\"Pedro\\\""));
    }

    #[test]
    fn test_network_query_selects_highways() {
        let client = test_client("Peñaflor");
        let query = client.network_query();
        assert!(query.contains("way[\"highway\"](area.a);"));
        assert!(!query.contains("relation"));
    }
}
