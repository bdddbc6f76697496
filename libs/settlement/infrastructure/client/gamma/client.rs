//! Gamma API client
//!
//! Used only as a fallback to look up outcome token ids when the position
//! data does not carry both sides of a market.

use super::types::GammaMarket;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};

/// Default Gamma API base URL
const GAMMA_API_BASE_URL: &str = "https://gamma-api.polymarket.com";

#[derive(Error, Debug)]
pub enum GammaError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Deserialization failed: {0}")]
    DeserializeFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

pub type Result<T> = std::result::Result<T, GammaError>;

/// Gamma Markets API client
pub struct GammaClient {
    base_url: String,
    client: Client,
}

impl GammaClient {
    /// Create new Gamma API client with default base URL
    pub fn new() -> Self {
        Self::with_base_url(GAMMA_API_BASE_URL)
    }

    /// Create new Gamma API client with custom base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
        }
    }

    /// Look up a market by its condition ID.
    ///
    /// Returns the first match, or `None` when the API has no market for
    /// the condition.
    pub async fn get_market_by_condition(&self, condition_id: &str) -> Result<Option<GammaMarket>> {
        let url = format!("{}/markets", self.base_url);
        let params = [("condition_id".to_string(), condition_id.to_string())];

        debug!("GET {} for condition {}", url, condition_id);

        let response = self.client.get(&url).query(&params).send().await?;

        let status = response.status();

        if status == 429 {
            warn!("Rate limit exceeded on Gamma API");
            return Err(GammaError::RateLimitExceeded);
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GammaError::ApiError(format!(
                "Failed to fetch market ({}): {}",
                status, error_text
            )));
        }

        let mut markets: Vec<GammaMarket> = response
            .json()
            .await
            .map_err(|e| GammaError::DeserializeFailed(e.to_string()))?;

        if markets.is_empty() {
            debug!("No Gamma market found for condition {}", condition_id);
            return Ok(None);
        }

        Ok(Some(markets.remove(0)))
    }
}

impl Default for GammaClient {
    fn default() -> Self {
        Self::new()
    }
}
