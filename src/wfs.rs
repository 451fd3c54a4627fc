//! WFS administrative-boundary download.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::warn;

use crate::config::Config;

const WFS_TYPE_NAME: &str = "division_comunal";

/// Client for the administrative-boundary WFS endpoint.
pub struct WfsClient {
    client: Client,
    endpoint: String,
}

impl WfsClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::builder()
                .user_agent("Arrayan/0.1 (municipal geodata pipeline)")
                .timeout(Duration::from_secs(60))
                .build()
                .expect("Failed to create HTTP client"),
            endpoint: config.wfs_url.clone(),
        }
    }

    /// Fetch the boundary features for a comuna.
    ///
    /// Returns the raw GeoJSON body for verbatim persistence, or `None`
    /// when the service answers with a non-success status; that case is
    /// logged once and is not an error.
    pub async fn fetch_boundaries(&self, comuna: &str) -> Result<Option<String>> {
        let filter = cql_filter(comuna);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("service", "WFS"),
                ("version", "2.0.0"),
                ("request", "GetFeature"),
                ("typeName", WFS_TYPE_NAME),
                ("outputFormat", "application/json"),
                ("CQL_FILTER", filter.as_str()),
            ])
            .send()
            .await
            .context("WFS request failed")?;

        if !response.status().is_success() {
            warn!(
                "Could not fetch administrative boundaries (status {})",
                response.status()
            );
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .context("Failed to read WFS response")?;
        Ok(Some(body))
    }
}

/// Case-insensitive exact match on the comuna name.
fn cql_filter(comuna: &str) -> String {
    format!("comuna ILIKE '{}'", comuna.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cql_filter() {
        assert_eq!(cql_filter("Peñaflor"), "comuna ILIKE 'Peñaflor'");
    }

    #[test]
    fn test_cql_filter_escapes_quotes() {
        assert_eq!(cql_filter("O'Higgins"), "comuna ILIKE 'O''Higgins'");
    }
}
