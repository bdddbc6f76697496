//! Domain Layer
//!
//! Settlement types and decision math, independent of any API or chain
//! backend.

pub mod models;

pub use models::{
    MarketResolution, Outcome, SettlementPlan, SkipReason, TokenPair, DUST_THRESHOLD,
};
