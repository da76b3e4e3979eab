// Catalog Search Client
//
// Thin HTTP client for the external song metadata catalog. The candidates
// come back as opaque JSON; ranking and selection happen client-side.

use std::time::Duration;

use tracing::{debug, info};

use openmic_core::port::ProcessError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct CatalogClient {
    base_url: String,
    http: reqwest::Client,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into(),
            http,
        }
    }

    /// Search the catalog, returning candidate metadata records
    pub async fn search(&self, terms: &str) -> Result<Vec<serde_json::Value>, ProcessError> {
        let url = format!("{}/search", self.base_url.trim_end_matches('/'));
        debug!(url = %url, terms = %terms, "Catalog search");

        let response = self
            .http
            .get(&url)
            .query(&[("q", terms)])
            .send()
            .await
            .map_err(|e| ProcessError::EngineFailure(format!("catalog request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ProcessError::EngineFailure(format!(
                "catalog returned {}",
                response.status()
            )));
        }

        let candidates: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| ProcessError::EngineFailure(format!("catalog response invalid: {}", e)))?;

        info!(terms = %terms, count = candidates.len(), "Catalog search complete");
        Ok(candidates)
    }
}
