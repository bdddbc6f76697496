//! Data API position types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single position row reported by the Data API.
///
/// The API returns many more fields (pricing, P&L, event metadata); only the
/// ones settlement needs are kept, and unknown fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Market condition ID
    pub condition_id: String,

    /// Outcome token ID held by this position
    pub asset: String,

    /// Position outcome label (e.g., "Yes", "No", "Up", "Down")
    pub outcome: String,

    /// Position size in shares as reported off-chain
    pub size: f64,

    /// Market title/question
    pub title: String,

    /// Whether the API believes the market has resolved.
    ///
    /// Advisory only: resolution is re-checked on chain before any action.
    #[serde(default)]
    pub redeemable: bool,
}

/// Partition positions by market condition ID.
///
/// Every input position lands in exactly one bucket; ordering within a
/// bucket follows the API response order.
pub fn group_by_condition(positions: Vec<Position>) -> HashMap<String, Vec<Position>> {
    let mut groups: HashMap<String, Vec<Position>> = HashMap::new();
    for position in positions {
        groups
            .entry(position.condition_id.clone())
            .or_default()
            .push(position);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_deserialization() {
        // Real API response shape; extra fields must be tolerated
        let json = r#"{
            "proxyWallet": "0x000000000000000000000000000000000000dead",
            "asset": "2719515613422582620337412480873700091173613463422048941551190646073023654521",
            "conditionId": "0xc2d728a0c634f0b453d51e61759041cd054706ca808041a44ed07a7986946479",
            "size": 15000,
            "avgPrice": 0.55,
            "curPrice": 1.0,
            "redeemable": true,
            "mergeable": false,
            "title": "Bitcoin Up or Down - August 22, 3PM ET",
            "slug": "bitcoin-up-or-down-august-22-3pm-et",
            "outcome": "Up",
            "outcomeIndex": 0,
            "oppositeAsset": "31905956707945147082248578912350061982363371270525287591561984682339308910362",
            "endDate": "2026-08-22",
            "negativeRisk": false
        }"#;

        let position: Position = serde_json::from_str(json).expect("Failed to deserialize position");

        assert_eq!(
            position.condition_id,
            "0xc2d728a0c634f0b453d51e61759041cd054706ca808041a44ed07a7986946479"
        );
        assert_eq!(position.size, 15000.0);
        assert_eq!(position.outcome, "Up");
        assert!(position.redeemable);
    }

    #[test]
    fn test_position_deserialization_without_redeemable() {
        let json = r#"{
            "conditionId": "0xdef",
            "asset": "123",
            "outcome": "Yes",
            "size": 100,
            "title": "Test Market"
        }"#;

        let position: Position = serde_json::from_str(json).expect("Failed to deserialize position");

        assert_eq!(position.size, 100.0);
        assert!(!position.redeemable);
    }

    #[test]
    fn test_group_by_condition() {
        let make = |cid: &str, asset: &str, outcome: &str| Position {
            condition_id: cid.to_string(),
            asset: asset.to_string(),
            outcome: outcome.to_string(),
            size: 10.0,
            title: "Test".to_string(),
            redeemable: true,
        };

        let positions = vec![
            make("0xaaa", "1", "Yes"),
            make("0xbbb", "2", "No"),
            make("0xaaa", "3", "No"),
        ];

        let groups = group_by_condition(positions);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups["0xaaa"].len(), 2);
        assert_eq!(groups["0xbbb"].len(), 1);
        // Response order preserved within a bucket
        assert_eq!(groups["0xaaa"][0].outcome, "Yes");
        assert_eq!(groups["0xaaa"][1].outcome, "No");
    }

    #[test]
    fn test_group_by_condition_empty() {
        let groups = group_by_condition(Vec::new());
        assert!(groups.is_empty());
    }
}
