//! Session configuration parsed from environment variables.
//!
//! Every knob has a default; malformed values fall back to the default
//! rather than failing startup, since none of them gate correctness.

use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_SETTLE_GRACE_MS: u64 = 100;
pub const DEFAULT_CHAIN_GUARD_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_CHAIN_SWITCH_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_REQUIRED_CHAIN_ID: u64 = 137;
pub const DEFAULT_CHECKOUT_FIAT: &str = "USD";
pub const DEFAULT_CHECKOUT_TOKEN: &str = "USDC";
pub const DEFAULT_FUNDING_PATH: &str = "wallet/funding";
pub const DEFAULT_WELCOME_DURATION_MS: u64 = 2_500;
pub const DEFAULT_NOTICE_DURATION_MS: u64 = 3_000;
pub const DEFAULT_SESSION_COOKIE: &str = "auth_store";

pub const POLYGON_CHAIN_ID: u64 = 137;
pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;

const RPC_URL_PREFIX: &str = "TOPUP_RPC_URL_";

/// Chain Guardian settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainGuardConfig {
    /// Chain the wallet is kept on once authenticated.
    pub target_chain_id: u64,
    /// Quiet period after the last input change before acting.
    pub debounce: Duration,
    /// Upper bound on a single switch request.
    pub switch_timeout: Duration,
}

/// Funding/checkout settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingConfig {
    /// The single fiat currency offered in checkout.
    pub fiat_currency: String,
    /// The single token checkout settles into.
    pub settlement_token: String,
    /// Wallet UI path opened by the fallback.
    pub funding_path: String,
    /// Display duration for funding notices.
    pub notice_duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Grace delay awaited after a restored provider handle is seen.
    pub settle_grace: Duration,
    pub chain_guard: ChainGuardConfig,
    pub funding: FundingConfig,
    /// Display duration for the welcome notice.
    pub welcome_duration: Duration,
    /// Cookie that carries the provider's session seed.
    pub session_cookie: String,
    /// JSON-RPC endpoint per chain id.
    pub rpc_endpoints: HashMap<u64, String>,
    /// Extra noisy log patterns to drop, on top of the built-in ones.
    pub log_suppress: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_vars(std::iter::empty())
    }
}

impl SessionConfig {
    /// Build the config from the process environment.
    ///
    /// - `TOPUP_SETTLE_GRACE_MS`: default 100
    /// - `TOPUP_CHAIN_GUARD_DEBOUNCE_MS`: default 500
    /// - `TOPUP_CHAIN_SWITCH_TIMEOUT_MS`: default 30000
    /// - `TOPUP_REQUIRED_CHAIN_ID`: default 137
    /// - `TOPUP_CHECKOUT_FIAT` / `TOPUP_CHECKOUT_TOKEN`: default `USD` / `USDC`
    /// - `TOPUP_FUNDING_PATH`: default `wallet/funding`
    /// - `TOPUP_WELCOME_DURATION_MS` / `TOPUP_NOTICE_DURATION_MS`: default 2500 / 3000
    /// - `TOPUP_SESSION_COOKIE`: default `auth_store`
    /// - `TOPUP_RPC_URL_<chain id>`: per-chain JSON-RPC endpoint override
    /// - `TOPUP_LOG_SUPPRESS`: comma-separated extra patterns
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build the config from an explicit set of key/value pairs.
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars.into_iter().collect();

        let mut rpc_endpoints = default_rpc_endpoints();
        for (key, value) in &vars {
            let Some(chain) = key.strip_prefix(RPC_URL_PREFIX) else {
                continue;
            };
            if let Ok(chain_id) = chain.parse::<u64>() {
                rpc_endpoints.insert(chain_id, value.trim_end_matches('/').to_string());
            }
        }

        let log_suppress = vars
            .get("TOPUP_LOG_SUPPRESS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            settle_grace: millis(&vars, "TOPUP_SETTLE_GRACE_MS", DEFAULT_SETTLE_GRACE_MS),
            chain_guard: ChainGuardConfig {
                target_chain_id: parse_or(&vars, "TOPUP_REQUIRED_CHAIN_ID", DEFAULT_REQUIRED_CHAIN_ID),
                debounce: millis(&vars, "TOPUP_CHAIN_GUARD_DEBOUNCE_MS", DEFAULT_CHAIN_GUARD_DEBOUNCE_MS),
                switch_timeout: millis(&vars, "TOPUP_CHAIN_SWITCH_TIMEOUT_MS", DEFAULT_CHAIN_SWITCH_TIMEOUT_MS),
            },
            funding: FundingConfig {
                fiat_currency: string_or(&vars, "TOPUP_CHECKOUT_FIAT", DEFAULT_CHECKOUT_FIAT),
                settlement_token: string_or(&vars, "TOPUP_CHECKOUT_TOKEN", DEFAULT_CHECKOUT_TOKEN),
                funding_path: string_or(&vars, "TOPUP_FUNDING_PATH", DEFAULT_FUNDING_PATH),
                notice_duration: millis(&vars, "TOPUP_NOTICE_DURATION_MS", DEFAULT_NOTICE_DURATION_MS),
            },
            welcome_duration: millis(&vars, "TOPUP_WELCOME_DURATION_MS", DEFAULT_WELCOME_DURATION_MS),
            session_cookie: string_or(&vars, "TOPUP_SESSION_COOKIE", DEFAULT_SESSION_COOKIE),
            rpc_endpoints,
            log_suppress,
        }
    }
}

fn default_rpc_endpoints() -> HashMap<u64, String> {
    HashMap::from([
        (POLYGON_CHAIN_ID, "https://polygon-rpc.com".to_string()),
        (SEPOLIA_CHAIN_ID, "https://rpc.sepolia.org".to_string()),
    ])
}

fn parse_or<T>(vars: &HashMap<String, String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    vars.get(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn millis(vars: &HashMap<String, String>, key: &str, default: u64) -> Duration {
    Duration::from_millis(parse_or(vars, key, default))
}

fn string_or(vars: &HashMap<String, String>, key: &str, default: &str) -> String {
    vars.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
