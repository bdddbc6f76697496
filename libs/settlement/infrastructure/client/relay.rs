//! Relay submission client
//!
//! Sends batches of pre-encoded transactions to the gasless relay on behalf
//! of the proxy wallet. Preferred over direct submission: one batch settles
//! every market and the relay pays gas.
//!
//! The relay meters builder accounts; a spent quota surfaces as HTTP 429 or
//! a quota message in the response body and is mapped to
//! [`RelayError::RateLimited`] with the advertised reset delay.

use base64::{engine::general_purpose::URL_SAFE, Engine};
use ethers::types::Address;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info, warn};

type HmacSha256 = Hmac<Sha256>;

/// When the relay reports exhaustion without a usable delay, assume a full
/// hour before retrying the relay path.
pub const DEFAULT_RESET_SECS: u64 = 3600;

/// Delay between confirmation polls
const POLL_INTERVAL_MS: u64 = 2000;

/// How long to poll for a terminal state before giving up
const CONFIRM_TIMEOUT_SECS: u64 = 60;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Relay API error: {0}")]
    ApiError(String),

    #[error("Deserialization failed: {0}")]
    DeserializeFailed(String),

    #[error("Relay quota exhausted, resets in {resets_in_secs}s")]
    RateLimited { resets_in_secs: u64 },

    #[error("Relay rejected batch: {0}")]
    Rejected(String),

    #[error("Timed out waiting for relay confirmation: {0}")]
    Timeout(String),

    #[error("Auth error: {0}")]
    AuthError(String),
}

pub type Result<T> = std::result::Result<T, RelayError>;

/// Builder-account credentials for relay authentication
#[derive(Debug, Clone)]
pub struct BuilderCredentials {
    pub key: String,
    pub secret: String,
    pub passphrase: String,
}

/// One encoded transaction in a relay batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayTransaction {
    pub to: String,
    pub data: String,
    pub value: String,
}

impl RelayTransaction {
    pub fn new(to: Address, data: impl AsRef<[u8]>) -> Self {
        Self {
            to: format!("{:?}", to),
            data: format!("0x{}", hex::encode(data)),
            value: "0".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteRequest<'a> {
    from: String,
    transactions: &'a [RelayTransaction],
    description: &'a str,
}

/// State of a submitted batch as reported by the relay
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelaySubmission {
    #[serde(default, alias = "transactionID")]
    pub transaction_id: String,

    #[serde(default)]
    pub transaction_hash: Option<String>,

    #[serde(default)]
    pub state: String,
}

impl RelaySubmission {
    fn is_terminal(&self) -> bool {
        matches!(
            self.state.as_str(),
            "STATE_MINED" | "STATE_CONFIRMED" | "STATE_EXECUTED" | "STATE_FAILED"
        )
    }

    fn is_failed(&self) -> bool {
        self.state == "STATE_FAILED"
    }
}

/// Client for the batched gasless relay
pub struct RelayClient {
    base_url: String,
    from: Address,
    credentials: BuilderCredentials,
    client: Client,
}

impl RelayClient {
    pub fn new(
        base_url: impl Into<String>,
        from: Address,
        credentials: BuilderCredentials,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            base_url: base_url.into(),
            from,
            credentials,
            client,
        }
    }

    /// Submit a batch of transactions for relayed execution.
    ///
    /// The relay signs and pays for the on-chain submission; the returned
    /// handle can be polled for the terminal state.
    pub async fn execute_batch(
        &self,
        transactions: &[RelayTransaction],
        description: &str,
    ) -> Result<RelaySubmission> {
        let path = "/execute";
        let url = format!("{}{}", self.base_url, path);

        let request = ExecuteRequest {
            from: ethers::utils::to_checksum(&self.from, None),
            transactions,
            description,
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| RelayError::DeserializeFailed(e.to_string()))?;

        info!(
            "Submitting batch of {} transaction(s) to relay: {}",
            transactions.len(),
            description
        );

        let response = self
            .client
            .post(&url)
            .headers(self.auth_headers("POST", path, &body)?)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();

        if status == 429 {
            let text = response.text().await.unwrap_or_default();
            warn!("Relay returned 429: {}", text);
            return Err(RelayError::RateLimited {
                resets_in_secs: parse_reset_seconds(&text).unwrap_or(DEFAULT_RESET_SECS),
            });
        }

        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            if is_rate_limit_message(&text) {
                warn!("Relay quota exhausted: {}", text);
                return Err(RelayError::RateLimited {
                    resets_in_secs: parse_reset_seconds(&text).unwrap_or(DEFAULT_RESET_SECS),
                });
            }

            return Err(RelayError::ApiError(format!(
                "Batch submission failed ({}): {}",
                status, text
            )));
        }

        let submission: RelaySubmission = response
            .json()
            .await
            .map_err(|e| RelayError::DeserializeFailed(e.to_string()))?;

        debug!(
            "Relay accepted batch: id={} state={}",
            submission.transaction_id, submission.state
        );
        Ok(submission)
    }

    /// Poll a submission until the relay reports a terminal state.
    pub async fn wait_for_confirmation(
        &self,
        submission: RelaySubmission,
    ) -> Result<RelaySubmission> {
        if submission.is_terminal() {
            return finish(submission);
        }

        let path = "/transaction";
        let url = format!("{}{}", self.base_url, path);
        let deadline = std::time::Instant::now() + Duration::from_secs(CONFIRM_TIMEOUT_SECS);

        loop {
            tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;

            let response = self
                .client
                .get(&url)
                .query(&[("id", submission.transaction_id.as_str())])
                .headers(self.auth_headers("GET", path, "")?)
                .send()
                .await?;

            if response.status().is_success() {
                let states: Vec<RelaySubmission> = response
                    .json()
                    .await
                    .map_err(|e| RelayError::DeserializeFailed(e.to_string()))?;

                if let Some(current) = states.into_iter().next() {
                    debug!(
                        "Relay batch {} state: {}",
                        current.transaction_id, current.state
                    );
                    if current.is_terminal() {
                        return finish(current);
                    }
                }
            } else {
                debug!("Relay status poll returned {}", response.status());
            }

            if std::time::Instant::now() >= deadline {
                return Err(RelayError::Timeout(format!(
                    "batch {} not confirmed after {}s",
                    submission.transaction_id, CONFIRM_TIMEOUT_SECS
                )));
            }
        }
    }

    /// Build the builder-auth headers for one request.
    ///
    /// Signature is HMAC-SHA256 over `timestamp + method + path + body`
    /// keyed with the base64-decoded secret, base64url-encoded.
    fn auth_headers(
        &self,
        method: &str,
        path: &str,
        body: &str,
    ) -> Result<reqwest::header::HeaderMap> {
        use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| RelayError::AuthError(e.to_string()))?
            .as_secs();

        let signature = sign_request(&self.credentials.secret, timestamp, method, path, body)?;

        let mut headers = HeaderMap::new();
        let entries = [
            ("POLY_BUILDER_API_KEY", self.credentials.key.clone()),
            ("POLY_BUILDER_PASSPHRASE", self.credentials.passphrase.clone()),
            ("POLY_BUILDER_TIMESTAMP", timestamp.to_string()),
            ("POLY_BUILDER_SIGNATURE", signature),
        ];

        for (name, value) in entries {
            let name: HeaderName = name
                .parse()
                .map_err(|_| RelayError::AuthError(format!("invalid header name: {}", name)))?;
            let value =
                HeaderValue::from_str(&value).map_err(|e| RelayError::AuthError(e.to_string()))?;
            headers.insert(name, value);
        }

        Ok(headers)
    }
}

fn finish(submission: RelaySubmission) -> Result<RelaySubmission> {
    if submission.is_failed() {
        return Err(RelayError::Rejected(format!(
            "batch {} ended in {}",
            submission.transaction_id, submission.state
        )));
    }
    info!(
        "Relay batch confirmed: id={} hash={}",
        submission.transaction_id,
        submission.transaction_hash.as_deref().unwrap_or("-")
    );
    Ok(submission)
}

/// Sign one relay request with the builder secret.
fn sign_request(
    secret: &str,
    timestamp: u64,
    method: &str,
    path: &str,
    body: &str,
) -> Result<String> {
    let secret_bytes = URL_SAFE
        .decode(secret)
        .map_err(|e| RelayError::AuthError(format!("Failed to decode secret: {}", e)))?;

    let message = format!("{}{}{}{}", timestamp, method, path, body);

    let mut mac = HmacSha256::new_from_slice(&secret_bytes)
        .map_err(|e| RelayError::AuthError(e.to_string()))?;
    mac.update(message.as_bytes());

    Ok(URL_SAFE.encode(mac.finalize().into_bytes()))
}

/// Whether an error body indicates a spent relay quota.
pub fn is_rate_limit_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("quota exceeded") || lower.contains("too many requests")
}

/// Extract the advertised reset delay from a quota message.
///
/// Looks for the "resets in N seconds" phrasing and pulls the number out
/// with plain string handling.
pub fn parse_reset_seconds(message: &str) -> Option<u64> {
    let lower = message.to_lowercase();
    let idx = lower.find("resets in")?;
    let rest = &lower[idx + "resets in".len()..];
    rest.split_whitespace().next()?.parse().ok()
}
