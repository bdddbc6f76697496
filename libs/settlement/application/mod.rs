//! Application Layer
//!
//! Contains the settlement use case services. This layer depends on the
//! domain and infrastructure layers.

pub mod executor;
pub mod facade;
pub mod planner;
pub mod resolver;

// Re-export application facade for binaries
pub use facade::SettlerApp;

// Re-export settlement services
pub use executor::{ExecutionMode, RunSummary, SettlementExecutor};
pub use planner::SettlementPlanner;
pub use resolver::PairResolver;
