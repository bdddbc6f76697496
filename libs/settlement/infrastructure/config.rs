//! Settlement engine configuration
//!
//! Everything is credentials and endpoints, so configuration comes from the
//! environment (plus `.env` in development) rather than a config file.

use ethers::types::Address;
use thiserror::Error;
use tracing::info;

use crate::infrastructure::client::chain::POLYGON_RPC_URL;
use crate::infrastructure::client::relay::BuilderCredentials;
use crate::infrastructure::state::DEFAULT_STATE_PATH;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable not found: {0}")]
    EnvVarMissing(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Runtime configuration for a settlement run
#[derive(Debug, Clone)]
pub struct SettlerConfig {
    /// Polygon JSON-RPC endpoint
    pub rpc_url: String,

    /// Signing key for the EOA (hex, with or without 0x prefix)
    pub private_key: String,

    /// Gnosis Safe proxy wallet holding the positions, when one is used
    pub proxy_address: Option<Address>,

    /// Data API base URL
    pub data_api_url: String,

    /// Gamma API base URL override (None = client default)
    pub gamma_api_url: Option<String>,

    /// Relay base URL
    pub relay_url: Option<String>,

    /// Builder credentials for the relay, when configured
    pub builder_credentials: Option<BuilderCredentials>,

    /// Where the relay rate-limit state is persisted
    pub state_path: String,
}

impl SettlerConfig {
    /// Load configuration from the environment (reads `.env` first).
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let private_key = require_var("PRIVATE_KEY")?;

        let proxy_address = match optional_var("POLY_PROXY_ADDRESS") {
            Some(raw) => Some(raw.parse().map_err(|_| {
                ConfigError::ValidationError(format!("POLY_PROXY_ADDRESS is not an address: {}", raw))
            })?),
            None => None,
        };

        let builder_credentials = match (
            optional_var("POLY_BUILDER_API_KEY"),
            optional_var("POLY_BUILDER_SECRET"),
            optional_var("POLY_BUILDER_PASSPHRASE"),
        ) {
            (Some(key), Some(secret), Some(passphrase)) => Some(BuilderCredentials {
                key,
                secret,
                passphrase,
            }),
            _ => None,
        };

        let config = Self {
            rpc_url: optional_var("RPC_URL").unwrap_or_else(|| POLYGON_RPC_URL.to_string()),
            private_key,
            proxy_address,
            data_api_url: optional_var("DATA_API_URL")
                .unwrap_or_else(|| "https://data-api.polymarket.com".to_string()),
            gamma_api_url: optional_var("GAMMA_API_URL"),
            relay_url: optional_var("RELAYER_URL"),
            builder_credentials,
            state_path: optional_var("RELAY_LIMIT_STATE_PATH")
                .unwrap_or_else(|| DEFAULT_STATE_PATH.to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        let key = self.private_key.trim_start_matches("0x");
        if key.len() != 64 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ConfigError::ValidationError(
                "PRIVATE_KEY must be 32 bytes of hex".to_string(),
            ));
        }

        if !self.rpc_url.starts_with("http") {
            return Err(ConfigError::ValidationError(format!(
                "RPC_URL must be an http(s) endpoint: {}",
                self.rpc_url
            )));
        }

        if let Some(url) = &self.relay_url {
            if !url.starts_with("http") {
                return Err(ConfigError::ValidationError(format!(
                    "RELAYER_URL must be an http(s) endpoint: {}",
                    url
                )));
            }
        }

        Ok(())
    }

    /// Log configuration summary (never the key material)
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  RPC endpoint: {}", self.rpc_url);
        info!("  Data API: {}", self.data_api_url);
        match &self.gamma_api_url {
            Some(url) => info!("  Gamma API: {}", url),
            None => info!("  Gamma API: (default)"),
        }
        match &self.proxy_address {
            Some(addr) => info!("  Proxy wallet: {:?}", addr),
            None => info!("  Proxy wallet: none (EOA mode)"),
        }
        match &self.relay_url {
            Some(url) => info!(
                "  Relay: {} (credentials {})",
                url,
                if self.builder_credentials.is_some() {
                    "set"
                } else {
                    "missing"
                }
            ),
            None => info!("  Relay: not configured"),
        }
        info!("  Rate-limit state: {}", self.state_path);
    }
}

fn require_var(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| ConfigError::EnvVarMissing(name.to_string()))
}

fn optional_var(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}
