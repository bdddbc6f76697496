//! Relay rate-limit state persistence
//!
//! The relay quota outlives a single run, so exhaustion is recorded in a
//! small JSON file and consulted on the next start. The store fails open:
//! a missing or unreadable file never blocks settlement, it only means the
//! relay will be tried again.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default location of the persisted state, relative to the working
/// directory.
pub const DEFAULT_STATE_PATH: &str = "state/relay_limit.json";

#[derive(Error, Debug)]
pub enum StateError {
    #[error("State file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("State serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StateError>;

/// Persisted relay quota state
///
/// `resetsAt` is stored as a unix timestamp (seconds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitState {
    pub exhausted: bool,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub resets_at: DateTime<Utc>,
}

impl RateLimitState {
    fn fresh() -> Self {
        Self {
            exhausted: false,
            resets_at: Utc::now(),
        }
    }
}

/// File-backed store for the relay rate-limit window
pub struct RelayLimitStore {
    state: RateLimitState,
    file_path: PathBuf,
}

impl RelayLimitStore {
    /// Open the store, loading prior state when the file exists.
    ///
    /// A missing, unreadable, or corrupt file yields a fresh available
    /// state instead of an error.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let file_path = path.as_ref().to_path_buf();

        let state = if file_path.exists() {
            match fs::read_to_string(&file_path) {
                Ok(content) => match serde_json::from_str::<RateLimitState>(&content) {
                    Ok(state) => {
                        debug!("Loaded relay limit state from {:?}", file_path);
                        state
                    }
                    Err(e) => {
                        warn!(
                            "Relay limit state at {:?} is corrupt ({}), assuming available",
                            file_path, e
                        );
                        RateLimitState::fresh()
                    }
                },
                Err(e) => {
                    warn!(
                        "Could not read relay limit state {:?} ({}), assuming available",
                        file_path, e
                    );
                    RateLimitState::fresh()
                }
            }
        } else {
            debug!("No relay limit state at {:?}, starting fresh", file_path);
            RateLimitState::fresh()
        };

        Self { state, file_path }
    }

    /// Whether the relay path may be attempted right now.
    pub fn is_available(&mut self) -> bool {
        self.is_available_at(Utc::now())
    }

    /// Availability check against an explicit clock.
    ///
    /// An elapsed window clears the exhaustion flag and persists the
    /// cleared state so later runs skip the check entirely.
    pub fn is_available_at(&mut self, now: DateTime<Utc>) -> bool {
        if !self.state.exhausted {
            return true;
        }

        if now >= self.state.resets_at {
            info!("Relay quota window elapsed, relay available again");
            self.state.exhausted = false;
            self.persist();
            return true;
        }

        let remaining = (self.state.resets_at - now).num_seconds();
        debug!("Relay quota exhausted for another {}s", remaining);
        false
    }

    /// Record a spent quota that resets after `reset_in_secs`.
    pub fn mark_exhausted(&mut self, reset_in_secs: u64) {
        self.mark_exhausted_at(Utc::now(), reset_in_secs)
    }

    /// Exhaustion record against an explicit clock.
    pub fn mark_exhausted_at(&mut self, now: DateTime<Utc>, reset_in_secs: u64) {
        self.state.exhausted = true;
        self.state.resets_at = now + Duration::seconds(reset_in_secs as i64);
        warn!(
            "Relay quota exhausted, marked unavailable until {}",
            self.state.resets_at
        );
        self.persist();
    }

    /// Moment the current window ends; meaningful only while exhausted.
    pub fn resets_at(&self) -> DateTime<Utc> {
        self.state.resets_at
    }

    fn persist(&self) {
        // A failed write must not abort settlement; worst case the relay
        // is retried one run early.
        if let Err(e) = self.save() {
            warn!("Failed to persist relay limit state: {}", e);
        }
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(&self.state)?;
        fs::write(&self.file_path, json)?;

        debug!("Saved relay limit state to {:?}", self.file_path);
        Ok(())
    }
}
