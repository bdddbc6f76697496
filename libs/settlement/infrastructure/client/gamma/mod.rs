//! Gamma API client module

pub mod client;
pub mod types;

pub use client::{GammaClient, GammaError};
pub use types::{GammaMarket, MarketToken};
