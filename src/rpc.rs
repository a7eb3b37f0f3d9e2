//! JSON-RPC chain client for balance queries.
//!
//! Thin HTTP wrapper over `eth_getBalance` and `eth_call`. Request encoding
//! and response parsing are pure functions so they can be tested without a
//! node.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, U256, hex};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::ErrorCode;

const REQUEST_TIMEOUT_SECS: u64 = 20;
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// `balanceOf(address)`
const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];
/// `decimals()`
const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];
/// Largest exponent a `uint256` amount can be scaled by.
const MAX_DECIMALS: u8 = 77;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    #[error("no RPC endpoint configured for chain {0}")]
    NoEndpoint(u64),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("RPC request failed: {0}")]
    Transport(String),
    #[error("RPC response error: status {status}")]
    Status { status: u16, body: String },
    #[error("RPC node error {code}: {message}")]
    Node { code: i64, message: String },
    #[error("RPC response parse failed: {0}")]
    Parse(String),
    #[error("cannot format amount: {0}")]
    Units(String),
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ErrorCode for RpcError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NoEndpoint(_) => "E_RPC_NO_ENDPOINT",
            Self::InvalidAddress(_) => "E_RPC_INVALID_ADDRESS",
            Self::Transport(_) => "E_RPC_TRANSPORT",
            Self::Status { .. } => "E_RPC_STATUS",
            Self::Node { .. } => "E_RPC_NODE",
            Self::Parse(_) => "E_RPC_PARSE",
            Self::Units(_) => "E_RPC_UNITS",
            Self::HttpClientBuild(_) => "E_RPC_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Status { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// TRAIT
// =============================================================================

/// On-chain balance queries.
#[async_trait::async_trait]
pub trait ChainRpc: Send + Sync {
    /// Native balance in wei.
    async fn native_balance(&self, chain_id: u64, address: &str) -> Result<U256, RpcError>;

    /// ERC-20 balance in the token's smallest unit.
    async fn token_balance(&self, chain_id: u64, token: &str, owner: &str) -> Result<U256, RpcError>;

    async fn token_decimals(&self, chain_id: u64, token: &str) -> Result<u8, RpcError>;
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct JsonRpcClient {
    http: reqwest::Client,
    endpoints: HashMap<u64, String>,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(endpoints: HashMap<u64, String>) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| RpcError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, endpoints, next_id: AtomicU64::new(1) })
    }

    async fn request(&self, chain_id: u64, method: &str, params: Value) -> Result<String, RpcError> {
        let url = self.endpoints.get(&chain_id).ok_or(RpcError::NoEndpoint(chain_id))?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = RpcRequest { jsonrpc: "2.0", id, method, params };

        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        if status != 200 {
            return Err(RpcError::Status { status, body: text });
        }

        parse_response(&text)
    }
}

#[async_trait::async_trait]
impl ChainRpc for JsonRpcClient {
    async fn native_balance(&self, chain_id: u64, address: &str) -> Result<U256, RpcError> {
        let address = parse_address(address)?;
        let result = self
            .request(chain_id, "eth_getBalance", json!([address.to_string(), "latest"]))
            .await?;
        parse_quantity(&result)
    }

    async fn token_balance(&self, chain_id: u64, token: &str, owner: &str) -> Result<U256, RpcError> {
        let token = parse_address(token)?;
        let data = encode_balance_of(owner)?;
        let result = self
            .request(chain_id, "eth_call", json!([{ "to": token.to_string(), "data": data }, "latest"]))
            .await?;
        parse_word(&result)
    }

    async fn token_decimals(&self, chain_id: u64, token: &str) -> Result<u8, RpcError> {
        let token = parse_address(token)?;
        let data = hex::encode_prefixed(DECIMALS_SELECTOR);
        let result = self
            .request(chain_id, "eth_call", json!([{ "to": token.to_string(), "data": data }, "latest"]))
            .await?;
        parse_decimals(parse_word(&result)?)
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

// =============================================================================
// ENCODING / PARSING
// =============================================================================

fn parse_response(json: &str) -> Result<String, RpcError> {
    let response: RpcResponse = serde_json::from_str(json).map_err(|e| RpcError::Parse(e.to_string()))?;
    if let Some(err) = response.error {
        return Err(RpcError::Node { code: err.code, message: err.message });
    }
    response
        .result
        .ok_or_else(|| RpcError::Parse("response has neither result nor error".into()))
}

fn parse_address(address: &str) -> Result<Address, RpcError> {
    if !address.starts_with("0x") {
        return Err(RpcError::InvalidAddress(address.to_string()));
    }
    Address::from_str(address).map_err(|_| RpcError::InvalidAddress(address.to_string()))
}

/// Calldata for `balanceOf(owner)`.
fn encode_balance_of(owner: &str) -> Result<String, RpcError> {
    let owner = parse_address(owner)?;
    let mut data = Vec::with_capacity(4 + 32);
    data.extend_from_slice(&BALANCE_OF_SELECTOR);
    data.extend_from_slice(owner.into_word().as_slice());
    Ok(hex::encode_prefixed(data))
}

/// Parse a JSON-RPC quantity (`0x`-prefixed, no leading zeros required).
fn parse_quantity(raw: &str) -> Result<U256, RpcError> {
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| RpcError::Parse(format!("quantity without 0x prefix: {raw}")))?;
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16).map_err(|e| RpcError::Parse(format!("bad quantity {raw}: {e}")))
}

/// Parse a 32-byte ABI word returned by `eth_call`.
fn parse_word(raw: &str) -> Result<U256, RpcError> {
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| RpcError::Parse(format!("call result without 0x prefix: {raw}")))?;
    let bytes = hex::decode(digits).map_err(|e| RpcError::Parse(format!("bad call result {raw}: {e}")))?;
    if bytes.is_empty() {
        return Err(RpcError::Parse("empty call result (not a contract?)".into()));
    }
    U256::try_from_be_slice(&bytes).ok_or_else(|| RpcError::Parse(format!("call result wider than 32 bytes: {raw}")))
}

fn parse_decimals(word: U256) -> Result<u8, RpcError> {
    u8::try_from(word)
        .ok()
        .filter(|d| *d <= MAX_DECIMALS)
        .ok_or_else(|| RpcError::Parse(format!("token decimals out of range: {word}")))
}

/// Format an integer amount with `decimals` fractional digits, trimming
/// trailing zeros but keeping at least one (`1.5`, `2.0`, `0.000001`).
///
/// # Errors
///
/// Returns [`RpcError::Units`] when `decimals` exceeds what a `uint256` can carry.
pub fn format_units(amount: U256, decimals: u8) -> Result<String, RpcError> {
    let full = alloy_primitives::utils::format_units(amount, decimals).map_err(|e| RpcError::Units(e.to_string()))?;
    let (whole, frac) = full.split_once('.').unwrap_or((full.as_str(), ""));
    let frac = frac.trim_end_matches('0');
    let frac = if frac.is_empty() { "0" } else { frac };
    Ok(format!("{whole}.{frac}"))
}

#[cfg(test)]
#[path = "rpc_test.rs"]
mod tests;
