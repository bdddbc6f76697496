//! Settlement planning
//!
//! Decides per market what (if anything) to execute, from verified on-chain
//! state only. The position index got us here, but balances it reports are
//! never trusted for amounts; the chain is read fresh for every market.

use ethers::types::Address;
use std::sync::Arc;
use tracing::debug;

use crate::domain::{SettlementPlan, SkipReason, TokenPair, DUST_THRESHOLD};
use crate::infrastructure::client::chain::ChainOracle;

/// Builds settlement plans from on-chain balances and payout state
pub struct SettlementPlanner {
    oracle: Arc<dyn ChainOracle>,
}

impl SettlementPlanner {
    pub fn new(oracle: Arc<dyn ChainOracle>) -> Self {
        Self { oracle }
    }

    /// Plan one market, or say why it is skipped.
    ///
    /// Balances and resolution are read together; a failure of either read
    /// skips this market without touching the rest of the run.
    pub async fn plan_market(
        &self,
        owner: Address,
        condition_id: &str,
        title: &str,
        pair: &TokenPair,
    ) -> std::result::Result<SettlementPlan, SkipReason> {
        let ((yes_balance, no_balance), resolution) = tokio::try_join!(
            self.oracle.pair_balances(owner, pair),
            self.oracle.resolution(condition_id),
        )
        .map_err(|e| SkipReason::OracleRead(e.to_string()))?;

        debug!(
            "{}: yes={:.6} no={:.6} resolved={}",
            condition_id, yes_balance, no_balance, resolution.is_resolved
        );

        if yes_balance <= DUST_THRESHOLD && no_balance <= DUST_THRESHOLD {
            return Err(SkipReason::DustBalances);
        }

        if !resolution.is_resolved {
            return Err(SkipReason::MarketOpen);
        }

        let plan = SettlementPlan::build(
            condition_id,
            title,
            pair.clone(),
            yes_balance,
            no_balance,
        );

        if !plan.is_actionable() {
            return Err(SkipReason::NothingToSettle);
        }

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MarketResolution;
    use crate::infrastructure::client::chain::{ChainError, Result as ChainResult};
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// In-memory oracle with canned balances and resolutions
    struct FakeOracle {
        balances: HashMap<String, f64>,
        resolutions: HashMap<String, MarketResolution>,
        fail_condition: Option<String>,
    }

    impl FakeOracle {
        fn new() -> Self {
            Self {
                balances: HashMap::new(),
                resolutions: HashMap::new(),
                fail_condition: None,
            }
        }

        fn with_balance(mut self, token_id: &str, balance: f64) -> Self {
            self.balances.insert(token_id.to_string(), balance);
            self
        }

        fn with_resolution(mut self, resolution: MarketResolution) -> Self {
            self.resolutions
                .insert(resolution.condition_id.clone(), resolution);
            self
        }

        fn failing_on(mut self, condition_id: &str) -> Self {
            self.fail_condition = Some(condition_id.to_string());
            self
        }
    }

    #[async_trait]
    impl ChainOracle for FakeOracle {
        async fn pair_balances(&self, _owner: Address, pair: &TokenPair) -> ChainResult<(f64, f64)> {
            Ok((
                *self.balances.get(&pair.yes_token_id).unwrap_or(&0.0),
                *self.balances.get(&pair.no_token_id).unwrap_or(&0.0),
            ))
        }

        async fn resolution(&self, condition_id: &str) -> ChainResult<MarketResolution> {
            if self.fail_condition.as_deref() == Some(condition_id) {
                return Err(ChainError::ProviderError("rpc unavailable".to_string()));
            }
            self.resolutions
                .get(condition_id)
                .cloned()
                .ok_or_else(|| ChainError::ContractError("unknown condition".to_string()))
        }
    }

    fn planner(oracle: FakeOracle) -> SettlementPlanner {
        SettlementPlanner::new(Arc::new(oracle))
    }

    fn owner() -> Address {
        Address::zero()
    }

    const COND: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    #[tokio::test]
    async fn test_plans_resolved_market_with_both_sides() {
        let oracle = FakeOracle::new()
            .with_balance("111", 30.0)
            .with_balance("222", 12.0)
            .with_resolution(MarketResolution::from_payouts(COND, [1, 0], 1));
        let pair = TokenPair::new("111", "222");

        let plan = planner(oracle)
            .plan_market(owner(), COND, "Test", &pair)
            .await
            .unwrap();

        assert_eq!(plan.merge_amount, 12.0);
        assert!(plan.needs_redeem);
    }

    #[tokio::test]
    async fn test_skips_unresolved_market() {
        let oracle = FakeOracle::new()
            .with_balance("111", 30.0)
            .with_resolution(MarketResolution::from_payouts(COND, [0, 0], 0));
        let pair = TokenPair::new("111", "222");

        let result = planner(oracle)
            .plan_market(owner(), COND, "Test", &pair)
            .await;

        assert_eq!(result.unwrap_err(), SkipReason::MarketOpen);
    }

    #[tokio::test]
    async fn test_skips_dust_balances_before_resolution_check() {
        // Dust holdings are skipped even in an unresolved market
        let oracle = FakeOracle::new()
            .with_resolution(MarketResolution::from_payouts(COND, [0, 0], 0));
        let pair = TokenPair::new("111", "222");

        let result = planner(oracle)
            .plan_market(owner(), COND, "Test", &pair)
            .await;

        assert_eq!(result.unwrap_err(), SkipReason::DustBalances);
    }

    #[tokio::test]
    async fn test_oracle_failure_becomes_skip() {
        let oracle = FakeOracle::new()
            .with_balance("111", 30.0)
            .failing_on(COND);
        let pair = TokenPair::new("111", "222");

        let result = planner(oracle)
            .plan_market(owner(), COND, "Test", &pair)
            .await;

        match result {
            Err(SkipReason::OracleRead(msg)) => assert!(msg.contains("rpc unavailable")),
            other => panic!("expected oracle read skip, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_losing_side_only_still_planned() {
        // Held NO tokens in a YES-resolved market: worthless, but the redeem
        // clears them off the books
        let oracle = FakeOracle::new()
            .with_balance("222", 50.0)
            .with_resolution(MarketResolution::from_payouts(COND, [1, 0], 1));
        let pair = TokenPair::new("111", "222");

        let plan = planner(oracle)
            .plan_market(owner(), COND, "Test", &pair)
            .await
            .unwrap();

        assert_eq!(plan.merge_amount, 0.0);
        assert!(plan.needs_redeem);
    }
}
