//! Polymarket API and chain clients
//!
//! Provides clients for the Data API (position index), Gamma API (market
//! metadata), the Polygon chain itself, and the transaction relay.

pub mod chain;
pub mod data;
pub mod gamma;
pub mod relay;

pub use chain::{ChainOracle, CtfClient, TxRoute, create_signer_provider, submit_transaction};
pub use data::{DataApiClient, Position, group_by_condition};
pub use gamma::{GammaClient, GammaMarket};
pub use relay::{BuilderCredentials, RelayClient, RelaySubmission, RelayTransaction};
