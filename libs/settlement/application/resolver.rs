//! Token-pair resolution
//!
//! The position index tells us which token ids we hold, but a merge needs
//! BOTH outcome token ids even when only one side is held. Positions are the
//! primary source; the Gamma API fills in whichever side is missing.

use tracing::{debug, warn};

use crate::domain::{Outcome, SkipReason, TokenPair};
use crate::infrastructure::client::data::Position;
use crate::infrastructure::client::gamma::{GammaClient, GammaMarket};

/// Resolves the YES/NO token ids for a market
pub struct PairResolver {
    gamma: GammaClient,
}

impl PairResolver {
    pub fn new(gamma: GammaClient) -> Self {
        Self { gamma }
    }

    /// Resolve both outcome token ids for a market.
    ///
    /// Held positions are authoritative for the sides they cover; Gamma is
    /// only consulted for the remainder. Failure to complete the pair skips
    /// the market, it never aborts the run.
    pub async fn resolve(
        &self,
        condition_id: &str,
        positions: &[Position],
    ) -> std::result::Result<TokenPair, SkipReason> {
        let (mut yes_id, mut no_id) = ids_from_positions(positions);

        if yes_id.is_none() || no_id.is_none() {
            debug!(
                "Positions cover {} side(s) of {}, consulting Gamma",
                yes_id.is_some() as u8 + no_id.is_some() as u8,
                condition_id
            );
            self.fill_from_gamma(condition_id, &mut yes_id, &mut no_id)
                .await;
        }

        match (yes_id, no_id) {
            (Some(yes), Some(no)) => Ok(TokenPair::new(yes, no)),
            _ => Err(SkipReason::NoTokenPair),
        }
    }

    /// Fill missing token ids from Gamma market metadata.
    ///
    /// Gamma failures are logged and swallowed; the caller decides what an
    /// incomplete pair means.
    async fn fill_from_gamma(
        &self,
        condition_id: &str,
        yes_id: &mut Option<String>,
        no_id: &mut Option<String>,
    ) {
        let market = match self.gamma.get_market_by_condition(condition_id).await {
            Ok(Some(market)) => market,
            Ok(None) => {
                debug!("Gamma has no market for condition {}", condition_id);
                return;
            }
            Err(e) => {
                warn!("Gamma lookup failed for {}: {}", condition_id, e);
                return;
            }
        };

        fill_from_market(&market, yes_id, no_id);
    }
}

/// Fill missing slots from one market's metadata: the ordered id list is
/// tried first, the labeled token array second.
fn fill_from_market(market: &GammaMarket, yes_id: &mut Option<String>, no_id: &mut Option<String>) {
    // clobTokenIds is ordered [yes, no] for binary markets
    let ids = market.clob_token_id_list();
    if ids.len() == 2 {
        if yes_id.is_none() {
            *yes_id = Some(ids[0].clone());
        }
        if no_id.is_none() {
            *no_id = Some(ids[1].clone());
        }
        return;
    }

    // Token entries carry explicit outcome labels when present
    for token in &market.tokens {
        match Outcome::from_label(&token.outcome) {
            Some(Outcome::Yes) if yes_id.is_none() => *yes_id = Some(token.token_id.clone()),
            Some(Outcome::No) if no_id.is_none() => *no_id = Some(token.token_id.clone()),
            _ => {}
        }
    }
}

/// Extract token ids from held positions, keyed by normalized outcome label.
///
/// Labels that normalize to neither side are ignored, so multi-outcome
/// markets never claim a binary slot by accident.
fn ids_from_positions(positions: &[Position]) -> (Option<String>, Option<String>) {
    let mut yes_id = None;
    let mut no_id = None;

    for position in positions {
        match Outcome::from_label(&position.outcome) {
            Some(Outcome::Yes) if yes_id.is_none() => yes_id = Some(position.asset.clone()),
            Some(Outcome::No) if no_id.is_none() => no_id = Some(position.asset.clone()),
            _ => {}
        }
    }

    (yes_id, no_id)
}
