//! Polymarket Position Settlement
//!
//! Reconciles the off-chain position index against on-chain CTF balances and
//! settles resolved markets: complete YES/NO sets are merged back into
//! collateral, leftovers are redeemed against the payout vector.

pub mod application;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used items
pub use application::{ExecutionMode, RunSummary, SettlerApp};
pub use domain::{
    MarketResolution, Outcome, SettlementPlan, SkipReason, TokenPair, DUST_THRESHOLD,
};
pub use infrastructure::{
    init_tracing, init_tracing_with_level, ChainOracle, DataApiClient, GammaClient, RelayClient,
    RelayLimitStore, SettlerConfig,
};
