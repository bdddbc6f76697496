//! Gamma API market metadata types

use serde::{Deserialize, Serialize};

/// Market metadata from the Gamma API.
///
/// Gamma responses are inconsistent across market generations; every field
/// is optional and `clobTokenIds` arrives either as a JSON array or as a
/// JSON-encoded string containing one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GammaMarket {
    #[serde(default)]
    pub condition_id: Option<String>,

    #[serde(default)]
    pub question: Option<String>,

    #[serde(default)]
    pub clob_token_ids: Option<serde_json::Value>,

    /// Per-outcome token descriptors, present on CLOB-shaped responses.
    #[serde(default)]
    pub tokens: Vec<MarketToken>,
}

/// One outcome token as described by the market metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketToken {
    #[serde(default)]
    pub token_id: String,

    #[serde(default)]
    pub outcome: String,
}

impl GammaMarket {
    /// Extract the CLOB token id list, tolerating both encodings.
    ///
    /// Returns an empty list when the field is missing or unparseable;
    /// callers fall through to the `tokens` array.
    pub fn clob_token_id_list(&self) -> Vec<String> {
        let value = match &self.clob_token_ids {
            Some(v) => v,
            None => return Vec::new(),
        };

        match value {
            serde_json::Value::Array(items) => items
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect(),
            serde_json::Value::String(inner) => {
                serde_json::from_str::<Vec<String>>(inner).unwrap_or_default()
            }
            _ => Vec::new(),
        }
    }
}
