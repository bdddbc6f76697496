//! Application Facade
//!
//! Public API for binaries (presentation layer). Wires configuration into
//! the clients and drives a full settlement run.

use anyhow::Context;
use ethers::prelude::*;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::executor::{RunSummary, SettlementExecutor};
use super::planner::SettlementPlanner;
use super::resolver::PairResolver;
use crate::domain::SkipReason;
use crate::infrastructure::client::chain::{
    create_signer_provider, ChainOracle, CtfClient, TxRoute, POLYGON_CHAIN_ID,
};
use crate::infrastructure::client::data::{group_by_condition, DataApiClient, Position};
use crate::infrastructure::client::gamma::GammaClient;
use crate::infrastructure::client::relay::RelayClient;
use crate::infrastructure::config::SettlerConfig;
use crate::infrastructure::state::RelayLimitStore;

type SignerProvider = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Application facade for the settlement use case
pub struct SettlerApp {
    owner: Address,
    data: DataApiClient,
    resolver: PairResolver,
    planner: SettlementPlanner,
    executor: SettlementExecutor<SignerProvider>,
}

impl SettlerApp {
    /// Initialize from environment configuration
    pub fn from_env() -> anyhow::Result<Self> {
        let config = SettlerConfig::from_env()?;
        config.log();
        Self::new(config)
    }

    /// Initialize from an explicit configuration
    pub fn new(config: SettlerConfig) -> anyhow::Result<Self> {
        let provider =
            create_signer_provider(&config.rpc_url, &config.private_key, POLYGON_CHAIN_ID)?;
        let wallet = provider.signer().clone();

        // Positions live in the proxy wallet when one is configured,
        // otherwise in the EOA itself
        let owner = config.proxy_address.unwrap_or_else(|| wallet.address());
        let route = match config.proxy_address {
            Some(safe) => TxRoute::Safe(safe),
            None => TxRoute::Eoa,
        };
        info!("Settling positions held by {:?} via {}", owner, route);

        let relay = build_relay(&config, owner);
        let limit_store = RelayLimitStore::open(&config.state_path);

        let oracle: Arc<dyn ChainOracle> = Arc::new(CtfClient::new(Arc::clone(&provider)));
        let executor = SettlementExecutor::new(
            CtfClient::new(Arc::clone(&provider)),
            provider,
            wallet,
            route,
            relay,
            limit_store,
        );

        let gamma = match &config.gamma_api_url {
            Some(url) => GammaClient::with_base_url(url),
            None => GammaClient::new(),
        };

        Ok(Self {
            owner,
            data: DataApiClient::with_base_url(&config.data_api_url),
            resolver: PairResolver::new(gamma),
            planner: SettlementPlanner::new(oracle),
            executor,
        })
    }

    /// Run one full settlement pass: discover, verify, plan, execute.
    ///
    /// Only an unreachable position index aborts the run; everything after
    /// discovery degrades per market.
    pub async fn run(&mut self, dry_run: bool, force_direct: bool) -> anyhow::Result<RunSummary> {
        let user = format!("{:?}", self.owner);
        info!("[RUN] Fetching position index for {}", user);

        let positions = self
            .data
            .get_positions(&user)
            .await
            .context("position source unavailable")?;
        info!("[RUN] Index reports {} position(s)", positions.len());

        let mut groups: Vec<(String, Vec<Position>)> =
            group_by_condition(positions).into_iter().collect();
        groups.sort_by(|a, b| a.0.cmp(&b.0));

        let mut plans = Vec::new();
        let mut skipped = 0usize;

        for (condition_id, positions) in &groups {
            let title = positions
                .first()
                .map(|p| p.title.clone())
                .unwrap_or_else(|| condition_id.clone());

            let pair = match self.resolver.resolve(condition_id, positions).await {
                Ok(pair) => pair,
                Err(reason) => {
                    log_skip(&title, &reason);
                    skipped += 1;
                    continue;
                }
            };

            match self
                .planner
                .plan_market(self.owner, condition_id, &title, &pair)
                .await
            {
                Ok(plan) => plans.push(plan),
                Err(reason) => {
                    log_skip(&title, &reason);
                    skipped += 1;
                }
            }
        }

        let mut summary = self.executor.settle_all(&plans, dry_run, force_direct).await;
        summary.skipped = skipped;

        info!("[RUN] Settlement pass complete: {}", summary);
        Ok(summary)
    }
}

/// Anomalous skips are warnings; routine ones (open markets, dust) stay at
/// debug so a normal run is quiet.
fn log_skip(title: &str, reason: &SkipReason) {
    match reason {
        SkipReason::NoTokenPair | SkipReason::OracleRead(_) => {
            warn!("[RUN] Skipping {}: {}", title, reason);
        }
        _ => debug!("[RUN] Skipping {}: {}", title, reason),
    }
}

fn build_relay(config: &SettlerConfig, owner: Address) -> Option<RelayClient> {
    let url = config.relay_url.as_ref()?;
    match &config.builder_credentials {
        Some(credentials) => Some(RelayClient::new(url, owner, credentials.clone())),
        None => {
            warn!("Relay URL set but builder credentials missing; using direct transactions");
            None
        }
    }
}
