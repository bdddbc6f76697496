//! Data API client module

pub mod client;
pub mod types;

pub use client::{DataApiClient, DataApiError};
pub use types::{group_by_condition, Position};
