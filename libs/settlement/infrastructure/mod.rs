//! Infrastructure Layer
//!
//! Contains implementations of external interfaces (API clients, chain access,
//! persisted state). This layer depends on the domain layer but not on the
//! application layer.

pub mod client;
pub mod config;
pub mod logging;
pub mod state;

// Re-export commonly used types from client
pub use client::{
    chain::{ChainError, ChainOracle, CtfClient, TxRoute},
    data::{DataApiClient, DataApiError, Position},
    gamma::{GammaClient, GammaMarket},
    relay::{BuilderCredentials, RelayClient, RelayError, RelayTransaction},
};

// Re-export config types
pub use config::{ConfigError, SettlerConfig};

// Re-export infrastructure services
pub use logging::{init_tracing, init_tracing_with_level};
pub use state::{RateLimitState, RelayLimitStore};
