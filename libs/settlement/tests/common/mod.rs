//! Common test utilities for settlement integration tests
//!
//! Provides position fixtures and an in-memory chain oracle so planning
//! scenarios run without touching Polygon.

use async_trait::async_trait;
use ethers::types::Address;
use std::collections::HashMap;

use settlement::domain::{MarketResolution, TokenPair};
use settlement::infrastructure::client::chain::{ChainError, ChainOracle};
use settlement::infrastructure::client::data::Position;

/// Build a position record the way the Data API reports one
pub fn make_position(
    condition_id: &str,
    asset: &str,
    outcome: &str,
    size: f64,
    title: &str,
) -> Position {
    Position {
        condition_id: condition_id.to_string(),
        asset: asset.to_string(),
        outcome: outcome.to_string(),
        size,
        title: title.to_string(),
        redeemable: false,
    }
}

/// In-memory chain oracle with canned balances and payout vectors
#[derive(Default)]
pub struct FakeOracle {
    balances: HashMap<String, f64>,
    resolutions: HashMap<String, MarketResolution>,
    failing: Vec<String>,
}

impl FakeOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(mut self, token_id: &str, balance: f64) -> Self {
        self.balances.insert(token_id.to_string(), balance);
        self
    }

    pub fn resolved_yes(mut self, condition_id: &str) -> Self {
        self.resolutions.insert(
            condition_id.to_string(),
            MarketResolution::from_payouts(condition_id, [1, 0], 1),
        );
        self
    }

    pub fn resolved_no(mut self, condition_id: &str) -> Self {
        self.resolutions.insert(
            condition_id.to_string(),
            MarketResolution::from_payouts(condition_id, [0, 1], 1),
        );
        self
    }

    /// Resolved without a single winner (both slots pay out)
    pub fn resolved_split(mut self, condition_id: &str) -> Self {
        self.resolutions.insert(
            condition_id.to_string(),
            MarketResolution::from_payouts(condition_id, [1, 1], 2),
        );
        self
    }

    pub fn unresolved(mut self, condition_id: &str) -> Self {
        self.resolutions.insert(
            condition_id.to_string(),
            MarketResolution::from_payouts(condition_id, [0, 0], 0),
        );
        self
    }

    /// Make every read for this condition fail
    pub fn failing_on(mut self, condition_id: &str) -> Self {
        self.failing.push(condition_id.to_string());
        self
    }
}

#[async_trait]
impl ChainOracle for FakeOracle {
    async fn pair_balances(
        &self,
        _owner: Address,
        pair: &TokenPair,
    ) -> Result<(f64, f64), ChainError> {
        Ok((
            *self.balances.get(&pair.yes_token_id).unwrap_or(&0.0),
            *self.balances.get(&pair.no_token_id).unwrap_or(&0.0),
        ))
    }

    async fn resolution(&self, condition_id: &str) -> Result<MarketResolution, ChainError> {
        if self.failing.iter().any(|c| c == condition_id) {
            return Err(ChainError::ProviderError("injected rpc failure".to_string()));
        }
        self.resolutions
            .get(condition_id)
            .cloned()
            .ok_or_else(|| ChainError::ContractError("unknown condition".to_string()))
    }
}
