//! Data API client for Polymarket
//!
//! Fetches the off-chain position index for a wallet. The index is the
//! discovery source only; balances are always re-verified on chain.

use super::types::Position;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Default Data API base URL
const DATA_API_BASE_URL: &str = "https://data-api.polymarket.com";

/// Page size for position queries
const POSITIONS_LIMIT: u32 = 100;

#[derive(Error, Debug)]
pub enum DataApiError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Deserialization failed: {0}")]
    DeserializeFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

pub type Result<T> = std::result::Result<T, DataApiError>;

/// Data API client for fetching user positions
pub struct DataApiClient {
    base_url: String,
    client: Client,
}

impl DataApiClient {
    /// Create new Data API client with default base URL
    pub fn new() -> Self {
        Self::with_base_url(DATA_API_BASE_URL)
    }

    /// Create new Data API client with custom base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            base_url: base_url.into(),
            client,
        }
    }

    /// Get all positions for a user address.
    ///
    /// Deliberately unfiltered: resolved-losing positions must be visible so
    /// their worthless tokens get cleared, and the API's redeemable flag is
    /// not trusted to decide anything.
    pub async fn get_positions(&self, user: &str) -> Result<Vec<Position>> {
        let url = format!("{}/positions", self.base_url);

        let params = [
            ("user".to_string(), user.to_string()),
            ("limit".to_string(), POSITIONS_LIMIT.to_string()),
        ];

        debug!("GET {} for user {}", url, user);

        let response = self.client.get(&url).query(&params).send().await?;

        let status = response.status();

        if status == 429 {
            warn!("Rate limit exceeded on Data API");
            return Err(DataApiError::RateLimitExceeded);
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(DataApiError::ApiError(format!(
                "Failed to fetch positions ({}): {}",
                status, error_text
            )));
        }

        let positions: Vec<Position> = response
            .json()
            .await
            .map_err(|e| DataApiError::DeserializeFailed(e.to_string()))?;

        debug!("Fetched {} positions for user {}", positions.len(), user);
        Ok(positions)
    }
}

impl Default for DataApiClient {
    fn default() -> Self {
        Self::new()
    }
}
