//! Settlement execution
//!
//! Turns settlement plans into on-chain state changes. The relay is the
//! preferred path (one gasless batch for the whole run); direct signed
//! transactions are the fallback whenever the relay is missing, exhausted,
//! or fails mid-run.

use ethers::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::SettlementPlan;
use crate::infrastructure::client::chain::{submit_transaction, ChainError, CtfClient, TxRoute};
use crate::infrastructure::client::relay::{RelayClient, RelayError, RelayTransaction};
use crate::infrastructure::state::RelayLimitStore;

/// Pause between consecutive direct transactions.
///
/// Safe nonces are sequential; a short gap keeps the provider from seeing
/// the follow-up before the previous receipt settles.
const TX_PAUSE_MS: u64 = 500;

/// Titles longer than this are truncated in logs
const TITLE_WIDTH: usize = 40;

/// How plans reach the chain this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One batched submission through the gasless relay.
    Relay,
    /// Per-market signed transactions from our own wallet.
    Direct,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Relay => write!(f, "batched relay"),
            ExecutionMode::Direct => write!(f, "direct transactions"),
        }
    }
}

/// Outcome counts for a settlement run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub planned: usize,
    pub merged: usize,
    pub redeemed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} planned, {} merged, {} redeemed, {} skipped, {} failed",
            self.planned, self.merged, self.redeemed, self.skipped, self.failed
        )
    }
}

/// Executes settlement plans over the relay or directly on chain
pub struct SettlementExecutor<M: Middleware> {
    ctf: CtfClient<M>,
    provider: Arc<M>,
    wallet: LocalWallet,
    route: TxRoute,
    relay: Option<RelayClient>,
    limit_store: RelayLimitStore,
}

impl<M: Middleware + 'static> SettlementExecutor<M> {
    pub fn new(
        ctf: CtfClient<M>,
        provider: Arc<M>,
        wallet: LocalWallet,
        route: TxRoute,
        relay: Option<RelayClient>,
        limit_store: RelayLimitStore,
    ) -> Self {
        Self {
            ctf,
            provider,
            wallet,
            route,
            relay,
            limit_store,
        }
    }

    /// Execute all plans and report what landed.
    ///
    /// Relay failures fall back to direct transactions within the same run;
    /// per-market direct failures are counted and never stop the loop.
    pub async fn settle_all(
        &mut self,
        plans: &[SettlementPlan],
        dry_run: bool,
        force_direct: bool,
    ) -> RunSummary {
        let mut summary = RunSummary {
            planned: plans.len(),
            ..RunSummary::default()
        };

        if plans.is_empty() {
            info!("[EXEC] Nothing to settle");
            return summary;
        }

        let mode = self.select_mode(force_direct);
        info!("[EXEC] {} market(s) to settle via {}", plans.len(), mode);
        for plan in plans {
            log_plan(plan);
        }

        if dry_run {
            info!("[EXEC] Dry run: no transactions submitted");
            return summary;
        }

        match mode {
            ExecutionMode::Relay => match self.settle_via_relay(plans).await {
                Ok(()) => {
                    for plan in plans {
                        if plan.should_merge() {
                            summary.merged += 1;
                        }
                        if plan.needs_redeem {
                            summary.redeemed += 1;
                        }
                    }
                }
                Err(RelayError::RateLimited { resets_in_secs }) => {
                    warn!(
                        "[EXEC] Relay quota exhausted (resets in {}s), falling back to direct",
                        resets_in_secs
                    );
                    self.limit_store.mark_exhausted(resets_in_secs);
                    self.settle_direct(plans, &mut summary).await;
                }
                Err(e) => {
                    warn!("[EXEC] Relay submission failed: {}, falling back to direct", e);
                    self.settle_direct(plans, &mut summary).await;
                }
            },
            ExecutionMode::Direct => self.settle_direct(plans, &mut summary).await,
        }

        summary
    }

    /// Pick the execution path for this run.
    ///
    /// The relay executes from the proxy wallet, so without a Safe route
    /// there is nothing for it to act on.
    pub fn select_mode(&mut self, force_direct: bool) -> ExecutionMode {
        if force_direct {
            info!("[EXEC] Direct mode forced by flag");
            return ExecutionMode::Direct;
        }

        if !matches!(self.route, TxRoute::Safe(_)) {
            debug!("[EXEC] No proxy wallet configured, relay unavailable");
            return ExecutionMode::Direct;
        }

        if self.relay.is_none() {
            debug!("[EXEC] Relay not configured");
            return ExecutionMode::Direct;
        }

        if !self.limit_store.is_available() {
            info!(
                "[EXEC] Relay quota exhausted until {}, using direct transactions",
                self.limit_store.resets_at()
            );
            return ExecutionMode::Direct;
        }

        ExecutionMode::Relay
    }

    /// Encode every plan's calls for a relay batch: the merge leg first
    /// when above dust, then the both-slot redeem when needed.
    fn build_batch(&self, plans: &[SettlementPlan]) -> Vec<RelayTransaction> {
        let mut transactions = Vec::new();
        for plan in plans {
            if plan.should_merge() {
                match self.ctf.encode_merge_call(&plan.condition_id, plan.merge_amount) {
                    Ok((to, data)) => transactions.push(RelayTransaction::new(to, data)),
                    Err(e) => warn!("[EXEC] Cannot encode merge for {}: {}", plan.condition_id, e),
                }
            }
            if plan.needs_redeem {
                match self.ctf.encode_redeem_call(&plan.condition_id) {
                    Ok((to, data)) => transactions.push(RelayTransaction::new(to, data)),
                    Err(e) => warn!("[EXEC] Cannot encode redeem for {}: {}", plan.condition_id, e),
                }
            }
        }
        transactions
    }

    /// Submit every plan's calls as one relay batch and wait for it to mine.
    async fn settle_via_relay(&self, plans: &[SettlementPlan]) -> std::result::Result<(), RelayError> {
        let relay = match self.relay.as_ref() {
            Some(relay) => relay,
            None => return Err(RelayError::ApiError("relay not configured".to_string())),
        };

        let transactions = self.build_batch(plans);
        if transactions.is_empty() {
            return Err(RelayError::ApiError("no encodable transactions".to_string()));
        }

        let description = format!("Settle {} market(s)", plans.len());
        let submission = relay.execute_batch(&transactions, &description).await?;
        let confirmed = relay.wait_for_confirmation(submission).await?;

        info!(
            "[EXEC] Relay batch confirmed: {}",
            confirmed
                .transaction_hash
                .as_deref()
                .unwrap_or(&confirmed.transaction_id)
        );
        Ok(())
    }

    /// Settle each plan with its own signed transactions.
    async fn settle_direct(&self, plans: &[SettlementPlan], summary: &mut RunSummary) {
        for plan in plans {
            if let Err(e) = self.settle_one_direct(plan, summary).await {
                warn!(
                    "[EXEC] Settlement failed for {}: {}",
                    short_title(&plan.title),
                    e
                );
                summary.failed += 1;
            }
        }
    }

    async fn settle_one_direct(
        &self,
        plan: &SettlementPlan,
        summary: &mut RunSummary,
    ) -> std::result::Result<(), ChainError> {
        if plan.should_merge() {
            let (to, data) = self.ctf.encode_merge_call(&plan.condition_id, plan.merge_amount)?;
            let tx_hash =
                submit_transaction(&self.route, to, data, &self.wallet, &self.provider).await?;
            info!(
                "[EXEC] Merged {:.6} set(s) for {}: {:?}",
                plan.merge_amount,
                short_title(&plan.title),
                tx_hash
            );
            summary.merged += 1;
            tokio::time::sleep(Duration::from_millis(TX_PAUSE_MS)).await;
        }

        if plan.needs_redeem {
            let (to, data) = self.ctf.encode_redeem_call(&plan.condition_id)?;
            let tx_hash =
                submit_transaction(&self.route, to, data, &self.wallet, &self.provider).await?;
            info!("[EXEC] Redeemed {}: {:?}", short_title(&plan.title), tx_hash);
            summary.redeemed += 1;
            tokio::time::sleep(Duration::from_millis(TX_PAUSE_MS)).await;
        }

        Ok(())
    }
}

fn log_plan(plan: &SettlementPlan) {
    info!(
        "[EXEC]   {} | yes={:.2} no={:.2} | merge={:.2}{}",
        short_title(&plan.title),
        plan.yes_balance,
        plan.no_balance,
        plan.merge_amount,
        if plan.needs_redeem { " + redeem" } else { "" }
    );
}

/// Truncate a market title for log lines
fn short_title(title: &str) -> String {
    if title.chars().count() <= TITLE_WIDTH {
        title.to_string()
    } else {
        let head: String = title.chars().take(TITLE_WIDTH).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TokenPair;
    use crate::infrastructure::client::relay::BuilderCredentials;
    use base64::{engine::general_purpose::URL_SAFE, Engine};
    use tempfile::TempDir;

    const COND: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    // Endpoints that refuse connections, so any accidental submission
    // fails fast instead of touching a real service
    fn test_executor(
        with_relay: bool,
        route: TxRoute,
        dir: &TempDir,
    ) -> SettlementExecutor<Provider<Http>> {
        let provider = Arc::new(Provider::<Http>::try_from("http://127.0.0.1:1").unwrap());
        let ctf = CtfClient::new(Arc::clone(&provider));
        let wallet: LocalWallet =
            "0x0123456789012345678901234567890123456789012345678901234567890123"
                .parse()
                .unwrap();

        let relay = with_relay.then(|| {
            RelayClient::new(
                "http://127.0.0.1:1",
                Address::zero(),
                BuilderCredentials {
                    key: "key".to_string(),
                    secret: URL_SAFE.encode(b"secret"),
                    passphrase: "pass".to_string(),
                },
            )
        });
        let limit_store = RelayLimitStore::open(dir.path().join("state.json"));

        SettlementExecutor::new(ctf, provider, wallet, route, relay, limit_store)
    }

    fn safe_route() -> TxRoute {
        TxRoute::Safe("0x000000000000000000000000000000000000dEaD".parse().unwrap())
    }

    fn make_plan(yes: f64, no: f64) -> SettlementPlan {
        SettlementPlan::build(COND, "Test market", TokenPair::new("111", "222"), yes, no)
    }

    #[test]
    fn test_select_mode_prefers_relay() {
        let dir = TempDir::new().unwrap();
        let mut exec = test_executor(true, safe_route(), &dir);
        assert_eq!(exec.select_mode(false), ExecutionMode::Relay);
    }

    #[test]
    fn test_select_mode_force_direct() {
        let dir = TempDir::new().unwrap();
        let mut exec = test_executor(true, safe_route(), &dir);
        assert_eq!(exec.select_mode(true), ExecutionMode::Direct);
    }

    #[test]
    fn test_select_mode_without_relay() {
        let dir = TempDir::new().unwrap();
        let mut exec = test_executor(false, safe_route(), &dir);
        assert_eq!(exec.select_mode(false), ExecutionMode::Direct);
    }

    #[test]
    fn test_select_mode_eoa_never_relays() {
        let dir = TempDir::new().unwrap();
        let mut exec = test_executor(true, TxRoute::Eoa, &dir);
        assert_eq!(exec.select_mode(false), ExecutionMode::Direct);
    }

    #[test]
    fn test_select_mode_exhausted_quota() {
        let dir = TempDir::new().unwrap();
        let mut exec = test_executor(true, safe_route(), &dir);
        exec.limit_store.mark_exhausted(3600);
        assert_eq!(exec.select_mode(false), ExecutionMode::Direct);
    }

    #[tokio::test]
    async fn test_dry_run_submits_nothing() {
        let dir = TempDir::new().unwrap();
        let mut exec = test_executor(true, safe_route(), &dir);
        let plans = vec![make_plan(10.0, 4.0), make_plan(0.0, 7.0)];

        // No network endpoints exist; a submission attempt would error out
        let summary = exec.settle_all(&plans, true, false).await;

        assert_eq!(summary.planned, 2);
        assert_eq!(summary.merged, 0);
        assert_eq!(summary.redeemed, 0);
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    async fn test_empty_plans_short_circuit() {
        let dir = TempDir::new().unwrap();
        let mut exec = test_executor(true, safe_route(), &dir);

        let summary = exec.settle_all(&[], false, false).await;
        assert_eq!(summary, RunSummary::default());
    }

    #[tokio::test]
    async fn test_relay_failure_falls_back_to_direct() {
        let dir = TempDir::new().unwrap();
        let mut exec = test_executor(true, safe_route(), &dir);
        let plans = vec![make_plan(10.0, 4.0), make_plan(3.0, 3.0)];

        // The relay submission fails (nothing listening), so every market
        // is attempted directly in the same run; those submissions fail
        // against the dead chain endpoint and are counted per market
        let summary = exec.settle_all(&plans, false, false).await;

        assert_eq!(summary.planned, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.merged, 0);
        assert_eq!(summary.redeemed, 0);
    }

    #[test]
    fn test_batch_merge_and_redeem() {
        let dir = TempDir::new().unwrap();
        let exec = test_executor(true, safe_route(), &dir);

        // Surplus on one side: one merge call plus one redeem call
        let batch = exec.build_batch(&[make_plan(10.0, 4.0)]);
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(|tx| tx.value == "0"));
        assert!(batch.iter().all(|tx| tx.data.starts_with("0x")));
    }

    #[test]
    fn test_batch_merge_only() {
        let dir = TempDir::new().unwrap();
        let exec = test_executor(true, safe_route(), &dir);

        let batch = exec.build_batch(&[make_plan(5.0, 5.0)]);
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_batch_redeem_only() {
        let dir = TempDir::new().unwrap();
        let exec = test_executor(true, safe_route(), &dir);

        let batch = exec.build_batch(&[make_plan(0.0, 7.0)]);
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_batch_covers_all_plans() {
        let dir = TempDir::new().unwrap();
        let exec = test_executor(true, safe_route(), &dir);

        let plans = vec![make_plan(10.0, 4.0), make_plan(3.0, 3.0), make_plan(0.0, 9.0)];
        let batch = exec.build_batch(&plans);
        assert_eq!(batch.len(), 4);
    }

    #[test]
    fn test_short_title_passthrough() {
        assert_eq!(short_title("Short title"), "Short title");
    }

    #[test]
    fn test_short_title_truncates() {
        let long = "Will the price of Bitcoin exceed $100,000 before the end of 2026?";
        let shortened = short_title(long);
        assert!(shortened.ends_with("..."));
        assert_eq!(shortened.chars().count(), TITLE_WIDTH + 3);
    }

    #[test]
    fn test_run_summary_display() {
        let summary = RunSummary {
            planned: 3,
            merged: 2,
            redeemed: 1,
            skipped: 4,
            failed: 0,
        };
        assert_eq!(
            summary.to_string(),
            "3 planned, 2 merged, 1 redeemed, 4 skipped, 0 failed"
        );
    }
}
