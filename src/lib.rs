//! Polymarket Position Settler - Main Library
//!
//! This crate provides the main library for the settlement tool, following
//! Clean Architecture principles.
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (CLI flags)
//! - **settlement**: Core settlement logic (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust
//! use poly_settler::bin_common::SettleArgs;
//! use settlement::application::SettlerApp;
//! ```

// Re-export workspace libraries for convenience
pub use settlement;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables
    //!
    //! Provides shared functionality for the presentation layer (binaries)
    //! following Clean Architecture principles.

    pub mod cli;

    pub use cli::{parse_args, SettleArgs};
}
