//! Coin List Client
//!
//! One-shot HTTP lookup of the tradable symbol catalog. No retry and no
//! caching: every call issues one GET and any failure is returned as-is.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::messages::CoinListResponse;
use crate::application::ports::{CatalogError, SymbolCatalog};
use crate::domain::catalog::CatalogEntry;

/// Default coin list endpoint.
pub const DEFAULT_CATALOG_URL: &str =
    "https://min-api.cryptocompare.com/data/all/coinlist?summary=true";

/// HTTP catalog client.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: Client,
    url: String,
}

impl CatalogClient {
    /// Create a client for `url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Endpoint this client fetches.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SymbolCatalog for CatalogClient {
    async fn fetch_symbol_catalog(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        tracing::debug!(url = %self.url, "Fetching symbol catalog");

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Symbol catalog request failed");
            return Err(CatalogError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;
        let parsed: CoinListResponse =
            serde_json::from_str(&text).map_err(|e| CatalogError::Parse(e.to_string()))?;

        let entries = normalize(parsed);
        tracing::info!(count = entries.len(), "Symbol catalog fetched");
        Ok(entries)
    }
}

/// Map `Data` records to entries, ordered by key, skipping incomplete ones.
fn normalize(response: CoinListResponse) -> Vec<CatalogEntry> {
    response
        .data
        .into_iter()
        .filter_map(|(key, record)| match (record.symbol, record.full_name) {
            (Some(symbol), Some(full_name)) => Some(CatalogEntry { symbol, full_name }),
            _ => {
                tracing::debug!(key, "Skipping incomplete catalog entry");
                None
            }
        })
        .collect()
}
