//! Core settlement domain types
//!
//! Pure data and math: no I/O, no chain access. Balances are expressed in
//! whole collateral units (6-decimal USDC scaled to f64).

use serde::{Deserialize, Serialize};

/// Balances at or below this are treated as zero.
///
/// On-chain conversions leave sub-micro residues that are not worth the gas
/// to settle; one micro-unit is the smallest representable collateral step.
pub const DUST_THRESHOLD: f64 = 0.000001;

/// Binary market side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Yes,
    No,
}

impl Outcome {
    /// Map a free-text outcome label to a side.
    ///
    /// Case-insensitive: "yes"/"up" are the YES side, "no"/"down" the NO
    /// side (crypto hourly markets label their sides Up/Down). Anything
    /// else returns `None` and claims no slot.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_lowercase().as_str() {
            "yes" | "up" => Some(Outcome::Yes),
            "no" | "down" => Some(Outcome::No),
            _ => None,
        }
    }

    /// Outcome slot index in the condition's payout vector.
    pub fn slot_index(&self) -> usize {
        match self {
            Outcome::Yes => 0,
            Outcome::No => 1,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Yes => write!(f, "YES"),
            Outcome::No => write!(f, "NO"),
        }
    }
}

/// The two outcome token ids of a binary market.
///
/// Only constructed once both slots are known; a partial pair is not
/// representable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub yes_token_id: String,
    pub no_token_id: String,
}

impl TokenPair {
    pub fn new(yes_token_id: impl Into<String>, no_token_id: impl Into<String>) -> Self {
        Self {
            yes_token_id: yes_token_id.into(),
            no_token_id: no_token_id.into(),
        }
    }
}

/// On-chain resolution state of a condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketResolution {
    pub condition_id: String,
    pub is_resolved: bool,
    /// `None` when unresolved, or when the payout vector resolved without a
    /// single full winner (split payouts).
    pub winning_outcome: Option<Outcome>,
    pub payout_numerators: [u64; 2],
    pub payout_denominator: u64,
}

impl MarketResolution {
    /// Derive resolution state from the reported payout vector.
    ///
    /// A condition is resolved once the oracle has set a non-zero payout
    /// denominator. The winner is the side whose numerator is positive while
    /// the other is zero; any other resolved vector has no single winner.
    pub fn from_payouts(condition_id: impl Into<String>, numerators: [u64; 2], denominator: u64) -> Self {
        let is_resolved = denominator > 0;
        let [yes_num, no_num] = numerators;

        let winning_outcome = if !is_resolved {
            None
        } else if yes_num > 0 && no_num == 0 {
            Some(Outcome::Yes)
        } else if no_num > 0 && yes_num == 0 {
            Some(Outcome::No)
        } else {
            None
        };

        Self {
            condition_id: condition_id.into(),
            is_resolved,
            winning_outcome,
            payout_numerators: numerators,
            payout_denominator: denominator,
        }
    }
}

/// Settlement actions computed for a single resolved market.
#[derive(Debug, Clone)]
pub struct SettlementPlan {
    pub condition_id: String,
    pub title: String,
    pub pair: TokenPair,
    pub yes_balance: f64,
    pub no_balance: f64,
    /// Complete YES+NO sets collapsible back into collateral.
    pub merge_amount: f64,
    /// True when either side holds a surplus above dust after merging.
    pub needs_redeem: bool,
}

impl SettlementPlan {
    /// Compute the plan for a market from its verified on-chain balances.
    pub fn build(
        condition_id: impl Into<String>,
        title: impl Into<String>,
        pair: TokenPair,
        yes_balance: f64,
        no_balance: f64,
    ) -> Self {
        let merge_amount = yes_balance.min(no_balance);
        let needs_redeem = (yes_balance - merge_amount) > DUST_THRESHOLD
            || (no_balance - merge_amount) > DUST_THRESHOLD;

        Self {
            condition_id: condition_id.into(),
            title: title.into(),
            pair,
            yes_balance,
            no_balance,
            merge_amount,
            needs_redeem,
        }
    }

    /// Whether the plan carries at least one executable action.
    pub fn is_actionable(&self) -> bool {
        self.merge_amount > DUST_THRESHOLD || self.needs_redeem
    }

    /// Whether the merge leg should be executed.
    pub fn should_merge(&self) -> bool {
        self.merge_amount > DUST_THRESHOLD
    }
}

/// Why a market was left out of the settlement plan.
///
/// Skips are per-market and never abort the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Could not determine both outcome token ids.
    NoTokenPair,
    /// Both on-chain balances at or below dust.
    DustBalances,
    /// Condition has no payout vector yet.
    MarketOpen,
    /// Resolved and funded, but no merge nor redeem is worthwhile.
    NothingToSettle,
    /// Balance or resolution read failed for this market only.
    OracleRead(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoTokenPair => write!(f, "could not resolve token pair"),
            SkipReason::DustBalances => write!(f, "balances below dust threshold"),
            SkipReason::MarketOpen => write!(f, "market not resolved yet"),
            SkipReason::NothingToSettle => write!(f, "nothing to settle"),
            SkipReason::OracleRead(e) => write!(f, "on-chain read failed: {}", e),
        }
    }
}
