//! CTF (Conditional Token Framework) chain access
//!
//! Everything settlement needs from Polygon: outcome token balances, payout
//! vectors, and the merge/redeem transactions that collapse positions back
//! into collateral.
//!
//! # Operations
//!
//! - **Merge**: Convert complete YES + NO sets back into USDC
//!   - 1 YES + 1 NO → 1 USDC, resolution not required
//! - **Redeem**: Claim payouts for a resolved condition
//!   - Both outcome slots are always claimed in one call; winning tokens
//!     pay out, losing tokens are burned for nothing
//!
//! # Concurrency Warning
//!
//! **Important**: This module is NOT safe for concurrent Safe transactions.
//! Gnosis Safe uses sequential nonces - if multiple transactions are
//! submitted simultaneously, they may use the same nonce causing one to
//! fail. Transactions are submitted one at a time.

use async_trait::async_trait;
use ethers::contract::abigen;
use ethers::prelude::*;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{MarketResolution, TokenPair};

// Contract addresses on Polygon
pub const POLYGON_RPC_URL: &str = "https://polygon-rpc.com";
pub const POLYGON_CHAIN_ID: u64 = 137;
pub const CTF_CONTRACT: &str = "0x4D97DCd97eC945f40cF65F87097ACe5EA0476045";
pub const USDC_ADDRESS: &str = "0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174";

/// Collateral (USDC.e) has 6 decimal places
pub const COLLATERAL_DECIMALS: u8 = 6;

/// Gas limit for CTF operations (merge/redeem)
const GAS_LIMIT: u64 = 500_000;

/// Multiplier for gas price (1.5 = 50% above network estimate)
pub const GAS_PRICE_MULTIPLIER: f64 = 1.5;

/// How long to wait for a transaction receipt before giving up
const RECEIPT_TIMEOUT_SECS: u64 = 60;

abigen!(
    ConditionalTokens,
    r#"[
        function mergePositions(address collateralToken, bytes32 parentCollectionId, bytes32 conditionId, uint256[] calldata partition, uint256 amount) external
        function redeemPositions(address collateralToken, bytes32 parentCollectionId, bytes32 conditionId, uint256[] calldata indexSets) external
        function balanceOf(address account, uint256 id) external view returns (uint256)
        function payoutNumerators(bytes32 conditionId, uint256 index) external view returns (uint256)
        function payoutDenominator(bytes32 conditionId) external view returns (uint256)
    ]"#
);

abigen!(
    GnosisSafe,
    r#"[
        function execTransaction(address to, uint256 value, bytes calldata data, uint8 operation, uint256 safeTxGas, uint256 baseGas, uint256 gasPrice, address gasToken, address payable refundReceiver, bytes memory signatures) external payable returns (bool success)
        function nonce() external view returns (uint256)
    ]"#
);

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("Contract error: {0}")]
    ContractError(String),
    #[error("Invalid condition ID: {0}")]
    InvalidConditionId(String),
    #[error("Invalid token ID: {0}")]
    InvalidTokenId(String),
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
}

pub type Result<T> = std::result::Result<T, ChainError>;

// =============================================================================
// Oracle Trait
// =============================================================================

/// Read-only view of the CTF contract used by the planner.
///
/// Abstracted so planning logic can run against an in-memory fake.
#[async_trait]
pub trait ChainOracle: Send + Sync {
    /// Balances of both outcome tokens held by `owner`, in whole
    /// collateral units.
    async fn pair_balances(&self, owner: Address, pair: &TokenPair) -> Result<(f64, f64)>;

    /// Current payout state of a condition.
    async fn resolution(&self, condition_id: &str) -> Result<MarketResolution>;
}

// =============================================================================
// Transaction Routing
// =============================================================================

/// How a direct transaction reaches the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxRoute {
    /// Signed and sent straight from the EOA.
    Eoa,
    /// Wrapped in a Gnosis Safe execTransaction for the proxy wallet.
    Safe(Address),
}

impl std::fmt::Display for TxRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxRoute::Eoa => write!(f, "EOA"),
            TxRoute::Safe(addr) => write!(f, "Safe({:?})", addr),
        }
    }
}

// =============================================================================
// CTF Client
// =============================================================================

/// Client for CTF reads and merge/redeem calldata
pub struct CtfClient<M: Middleware> {
    ctf: ConditionalTokens<M>,
    ctf_address: Address,
    collateral: Address,
}

impl<M: Middleware + 'static> CtfClient<M> {
    /// Create a new CTF client
    pub fn new(provider: Arc<M>) -> Self {
        let ctf_address: Address = CTF_CONTRACT.parse().unwrap();
        let collateral: Address = USDC_ADDRESS.parse().unwrap();

        Self {
            ctf: ConditionalTokens::new(ctf_address, provider),
            ctf_address,
            collateral,
        }
    }

    /// Encode merge positions call
    ///
    /// Collapses `amount` YES + `amount` NO tokens into `amount` USDC.
    pub fn encode_merge_call(&self, condition_id: &str, amount: f64) -> Result<(Address, Bytes)> {
        let condition_id = parse_condition_id(condition_id)?;

        // Binary market partition: [1, 2] represents YES (0b01) and NO (0b10)
        let partition = vec![U256::from(1), U256::from(2)];

        let call = self.ctf.merge_positions(
            self.collateral,
            [0u8; 32], // parentCollectionId is always 0 for Polymarket
            condition_id,
            partition,
            collateral_to_raw(amount),
        );

        Ok((self.ctf_address, call.calldata().unwrap_or_default()))
    }

    /// Encode redeem positions call
    ///
    /// Always claims both outcome slots: winners are paid out and losing
    /// tokens are burned, so one call fully clears the market.
    pub fn encode_redeem_call(&self, condition_id: &str) -> Result<(Address, Bytes)> {
        let condition_id = parse_condition_id(condition_id)?;

        let call = self.ctf.redeem_positions(
            self.collateral,
            [0u8; 32],
            condition_id,
            vec![U256::from(1), U256::from(2)],
        );

        Ok((self.ctf_address, call.calldata().unwrap_or_default()))
    }
}

#[async_trait]
impl<M: Middleware + 'static> ChainOracle for CtfClient<M> {
    async fn pair_balances(&self, owner: Address, pair: &TokenPair) -> Result<(f64, f64)> {
        let yes_id = parse_token_id(&pair.yes_token_id)?;
        let no_id = parse_token_id(&pair.no_token_id)?;

        let yes_call = self.ctf.balance_of(owner, yes_id);
        let no_call = self.ctf.balance_of(owner, no_id);
        let (yes_raw, no_raw) = tokio::try_join!(yes_call.call(), no_call.call())
            .map_err(|e| ChainError::ContractError(e.to_string()))?;

        Ok((collateral_from_raw(yes_raw), collateral_from_raw(no_raw)))
    }

    async fn resolution(&self, condition_id: &str) -> Result<MarketResolution> {
        let id = parse_condition_id(condition_id)?;

        let yes_call = self.ctf.payout_numerators(id, U256::zero());
        let no_call = self.ctf.payout_numerators(id, U256::one());
        let denom_call = self.ctf.payout_denominator(id);
        let (yes_num, no_num, denominator) =
            tokio::try_join!(yes_call.call(), no_call.call(), denom_call.call())
                .map_err(|e| ChainError::ContractError(e.to_string()))?;

        Ok(MarketResolution::from_payouts(
            condition_id,
            [yes_num.low_u64(), no_num.low_u64()],
            denominator.low_u64(),
        ))
    }
}

// =============================================================================
// Transaction Submission
// =============================================================================

/// Submit a pre-encoded call over the chosen route and wait for its receipt.
pub async fn submit_transaction<M: Middleware + 'static>(
    route: &TxRoute,
    to: Address,
    data: Bytes,
    wallet: &LocalWallet,
    provider: &Arc<M>,
) -> Result<TxHash> {
    match route {
        TxRoute::Safe(safe_address) => {
            execute_safe_tx(*safe_address, to, data, wallet, provider).await
        }
        TxRoute::Eoa => execute_eoa_tx(to, data, provider).await,
    }
}

/// Execute a transaction via Gnosis Safe
async fn execute_safe_tx<M: Middleware + 'static>(
    safe_address: Address,
    to: Address,
    data: Bytes,
    wallet: &LocalWallet,
    provider: &Arc<M>,
) -> Result<TxHash> {
    let safe = GnosisSafe::new(safe_address, provider.clone());
    let nonce = safe
        .nonce()
        .call()
        .await
        .map_err(|e| ChainError::ContractError(e.to_string()))?;

    let safe_tx_hash = compute_safe_tx_hash(
        safe_address, to, U256::zero(), data.clone(),
        0, U256::zero(), U256::zero(), U256::zero(),
        Address::zero(), Address::zero(), nonce, POLYGON_CHAIN_ID,
    );

    let signature = wallet
        .sign_hash(H256::from(safe_tx_hash))
        .map_err(|e| ChainError::ContractError(e.to_string()))?;

    let gas_price = get_dynamic_gas_price(provider).await?;

    let call = safe
        .exec_transaction(
            to, U256::zero(), data, 0,
            U256::zero(), U256::zero(), U256::zero(),
            Address::zero(), Address::zero(), signature.to_vec().into(),
        )
        .gas(U256::from(GAS_LIMIT))
        .gas_price(gas_price);

    let pending_tx = call
        .send()
        .await
        .map_err(|e| ChainError::ContractError(e.to_string()))?;

    let tx_hash = pending_tx.tx_hash();
    debug!(
        "[CHAIN] Safe transaction sent: {:?} (gas_price: {} gwei)",
        tx_hash,
        gas_price / U256::from(1_000_000_000u64)
    );

    await_receipt(pending_tx).await
}

/// Execute a transaction straight from the EOA
async fn execute_eoa_tx<M: Middleware + 'static>(
    to: Address,
    data: Bytes,
    provider: &Arc<M>,
) -> Result<TxHash> {
    let gas_price = get_dynamic_gas_price(provider).await?;

    let tx = TransactionRequest::new()
        .to(to)
        .data(data)
        .gas(GAS_LIMIT)
        .gas_price(gas_price);

    let pending_tx = provider
        .send_transaction(tx, None)
        .await
        .map_err(|e| ChainError::ProviderError(e.to_string()))?;

    let tx_hash = pending_tx.tx_hash();
    debug!(
        "[CHAIN] EOA transaction sent: {:?} (gas_price: {} gwei)",
        tx_hash,
        gas_price / U256::from(1_000_000_000u64)
    );

    await_receipt(pending_tx).await
}

/// Wait for a receipt with a hard timeout and check the execution status.
async fn await_receipt<P: JsonRpcClient>(pending_tx: PendingTransaction<'_, P>) -> Result<TxHash> {
    let tx_hash = pending_tx.tx_hash();

    let receipt = tokio::time::timeout(
        std::time::Duration::from_secs(RECEIPT_TIMEOUT_SECS),
        pending_tx,
    )
    .await
    .map_err(|_| ChainError::TransactionFailed(format!("Timeout. TX: {:?}", tx_hash)))?
    .map_err(|e| ChainError::TransactionFailed(e.to_string()))?
    .ok_or_else(|| ChainError::TransactionFailed("No receipt".to_string()))?;

    if receipt.status == Some(U64::from(1)) {
        info!("[CHAIN] Transaction confirmed: {:?}", tx_hash);
        Ok(tx_hash)
    } else {
        Err(ChainError::TransactionFailed("Transaction reverted".to_string()))
    }
}

/// Fetch current gas price from the network and apply the safety multiplier
async fn get_dynamic_gas_price<M: Middleware + 'static>(provider: &Arc<M>) -> Result<U256> {
    let network_gas_price = provider
        .get_gas_price()
        .await
        .map_err(|e| ChainError::ProviderError(format!("Failed to fetch gas price: {}", e)))?;

    let adjusted = (network_gas_price.as_u128() as f64 * GAS_PRICE_MULTIPLIER) as u128;
    let gas_price = U256::from(adjusted);

    debug!(
        "[CHAIN] Gas price: network={}gwei, adjusted={}gwei",
        network_gas_price / U256::from(1_000_000_000u64),
        gas_price / U256::from(1_000_000_000u64)
    );

    Ok(gas_price)
}

/// Build a signing provider for direct submissions
pub fn create_signer_provider(
    rpc_url: &str,
    private_key: &str,
    chain_id: u64,
) -> Result<Arc<SignerMiddleware<Provider<Http>, LocalWallet>>> {
    let provider = Provider::<Http>::try_from(rpc_url)
        .map_err(|e| ChainError::ProviderError(e.to_string()))?;
    let wallet: LocalWallet = private_key
        .trim_start_matches("0x")
        .parse()
        .map_err(|e: WalletError| ChainError::ProviderError(e.to_string()))?;
    Ok(Arc::new(SignerMiddleware::new(
        provider,
        wallet.with_chain_id(chain_id),
    )))
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse a condition ID string to bytes32
fn parse_condition_id(condition_id: &str) -> Result<[u8; 32]> {
    let hex_str = condition_id.trim_start_matches("0x");
    if hex_str.len() != 64 {
        return Err(ChainError::InvalidConditionId(format!(
            "Expected 64 hex chars, got {}",
            hex_str.len()
        )));
    }
    let bytes = hex::decode(hex_str)
        .map_err(|e| ChainError::InvalidConditionId(e.to_string()))?;
    let mut result = [0u8; 32];
    result.copy_from_slice(&bytes);
    Ok(result)
}

/// Parse an outcome token ID (decimal string) to U256
fn parse_token_id(token_id: &str) -> Result<U256> {
    U256::from_dec_str(token_id)
        .map_err(|e| ChainError::InvalidTokenId(format!("{}: {}", token_id, e)))
}

/// Compute Gnosis Safe transaction hash for signing
fn compute_safe_tx_hash(
    safe: Address, to: Address, value: U256, data: Bytes,
    operation: u8, safe_tx_gas: U256, base_gas: U256, gas_price: U256,
    gas_token: Address, refund_receiver: Address, nonce: U256, chain_id: u64,
) -> [u8; 32] {
    use ethers::utils::keccak256;

    let domain_type_hash = keccak256(b"EIP712Domain(uint256 chainId,address verifyingContract)");
    let mut domain_data = Vec::with_capacity(96);
    domain_data.extend_from_slice(&domain_type_hash);
    domain_data.extend_from_slice(&[0u8; 24]);
    domain_data.extend_from_slice(&chain_id.to_be_bytes());
    domain_data.extend_from_slice(&[0u8; 12]);
    domain_data.extend_from_slice(safe.as_bytes());
    let domain_separator = keccak256(&domain_data);

    let safe_tx_type_hash = keccak256(
        b"SafeTx(address to,uint256 value,bytes data,uint8 operation,uint256 safeTxGas,uint256 baseGas,uint256 gasPrice,address gasToken,address refundReceiver,uint256 nonce)"
    );

    let mut struct_data = Vec::with_capacity(384);
    struct_data.extend_from_slice(&safe_tx_type_hash);
    struct_data.extend_from_slice(&[0u8; 12]);
    struct_data.extend_from_slice(to.as_bytes());
    struct_data.extend_from_slice(&u256_to_bytes32(value));
    struct_data.extend_from_slice(&keccak256(&data));
    struct_data.extend_from_slice(&[0u8; 31]);
    struct_data.push(operation);
    struct_data.extend_from_slice(&u256_to_bytes32(safe_tx_gas));
    struct_data.extend_from_slice(&u256_to_bytes32(base_gas));
    struct_data.extend_from_slice(&u256_to_bytes32(gas_price));
    struct_data.extend_from_slice(&[0u8; 12]);
    struct_data.extend_from_slice(gas_token.as_bytes());
    struct_data.extend_from_slice(&[0u8; 12]);
    struct_data.extend_from_slice(refund_receiver.as_bytes());
    struct_data.extend_from_slice(&u256_to_bytes32(nonce));
    let struct_hash = keccak256(&struct_data);

    let mut final_data = Vec::with_capacity(66);
    final_data.push(0x19);
    final_data.push(0x01);
    final_data.extend_from_slice(&domain_separator);
    final_data.extend_from_slice(&struct_hash);

    keccak256(&final_data)
}

fn u256_to_bytes32(value: U256) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    bytes
}

/// Convert collateral amount (human readable) to raw 6-decimal units.
///
/// Truncates, never rounds up: an encoded amount must not exceed the
/// on-chain balance it was computed from.
pub fn collateral_to_raw(amount: f64) -> U256 {
    let raw = (amount * 10f64.powi(COLLATERAL_DECIMALS as i32)) as u64;
    U256::from(raw)
}

/// Convert raw 6-decimal units to human readable collateral
pub fn collateral_from_raw(raw: U256) -> f64 {
    raw.as_u128() as f64 / 10f64.powi(COLLATERAL_DECIMALS as i32)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> CtfClient<Provider<Http>> {
        let provider = Arc::new(Provider::<Http>::try_from("https://polygon-rpc.com").unwrap());
        CtfClient::new(provider)
    }

    #[test]
    fn test_parse_condition_id() {
        let valid = "0xabcd1234abcd1234abcd1234abcd1234abcd1234abcd1234abcd1234abcd1234";
        assert!(parse_condition_id(valid).is_ok());
        assert!(parse_condition_id(&valid[2..]).is_ok()); // Without 0x prefix
        assert!(parse_condition_id("invalid").is_err());
        assert!(parse_condition_id("0x1234").is_err()); // Too short
    }

    #[test]
    fn test_parse_token_id() {
        let id = "2719515613422582620337412480873700091173613463422048941551190646073023654521";
        assert!(parse_token_id(id).is_ok());
        assert!(parse_token_id("0").is_ok());
        assert!(parse_token_id("not-a-number").is_err());
        assert!(parse_token_id("").is_err());
    }

    #[test]
    fn test_contract_addresses() {
        assert!(CTF_CONTRACT.parse::<Address>().is_ok());
        assert!(USDC_ADDRESS.parse::<Address>().is_ok());
    }

    #[test]
    fn test_collateral_conversion() {
        // 100 USDC
        let raw = collateral_to_raw(100.0);
        assert_eq!(raw, U256::from(100_000_000u64));

        // Convert back
        let human = collateral_from_raw(raw);
        assert!((human - 100.0).abs() < 0.000001);

        // 0.5 USDC
        let raw = collateral_to_raw(0.5);
        assert_eq!(raw, U256::from(500_000u64));
    }

    #[test]
    fn test_collateral_to_raw_truncates() {
        // Must round down so encoded merges never exceed the balance
        let raw = collateral_to_raw(1.9999999);
        assert_eq!(raw, U256::from(1_999_999u64));
    }

    #[test]
    fn test_encode_merge_call() {
        let client = test_client();

        let condition_id = "0xabcd1234abcd1234abcd1234abcd1234abcd1234abcd1234abcd1234abcd1234";
        let result = client.encode_merge_call(condition_id, 50.0);
        assert!(result.is_ok());

        let (to, data) = result.unwrap();
        assert_eq!(to, CTF_CONTRACT.parse::<Address>().unwrap());
        assert!(!data.is_empty());
    }

    #[test]
    fn test_encode_redeem_call() {
        let client = test_client();

        let condition_id = "0xabcd1234abcd1234abcd1234abcd1234abcd1234abcd1234abcd1234abcd1234";
        let result = client.encode_redeem_call(condition_id);
        assert!(result.is_ok());

        let (to, data) = result.unwrap();
        assert_eq!(to, CTF_CONTRACT.parse::<Address>().unwrap());
        assert!(!data.is_empty());
    }

    #[test]
    fn test_encode_rejects_bad_condition_id() {
        let client = test_client();
        assert!(client.encode_merge_call("0x1234", 1.0).is_err());
        assert!(client.encode_redeem_call("garbage").is_err());
    }

    #[test]
    fn test_tx_route_display() {
        assert_eq!(TxRoute::Eoa.to_string(), "EOA");
        let safe: Address = "0x000000000000000000000000000000000000dEaD".parse().unwrap();
        assert!(TxRoute::Safe(safe).to_string().starts_with("Safe("));
    }
}
