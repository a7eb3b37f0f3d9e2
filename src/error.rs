//! Error taxonomy shared by the session components.
//!
//! DESIGN
//! ======
//! Each concern owns its own `thiserror` enum (`WalletError` here, `RpcError`
//! in `rpc`, `FundingError` in `funding`, `SeedError` in `seed`). All of them
//! implement [`ErrorCode`] so log lines and user-facing notices can carry a
//! stable machine-readable code next to the human message.
//!
//! ERROR HANDLING
//! ==============
//! Nothing in the session core is fatal. Signal errors are shown inline,
//! best-effort failures are only logged, funding failures are shown once.

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;

/// Stable error code and retry hint for a domain error.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

/// Errors reported by the embedded-wallet SDK.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    /// The user closed the login modal or rejected the request.
    #[error("request rejected by user: {0}")]
    Rejected(String),

    /// The wallet does not know the requested chain.
    #[error("chain {0} is not available in the wallet")]
    ChainUnavailable(u64),

    /// A chain switch is already waiting on the wallet.
    #[error("a chain switch is already pending")]
    SwitchPending,

    /// The operation needs a session and none exists.
    #[error("wallet not connected")]
    NotConnected,

    /// The SDK did not answer within the configured bound.
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: &'static str, after_ms: u64 },

    /// Any other SDK failure, carrying the SDK's message.
    #[error("wallet sdk error: {0}")]
    Sdk(String),
}

impl ErrorCode for WalletError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Rejected(_) => "E_REJECTED",
            Self::ChainUnavailable(_) => "E_CHAIN_UNAVAILABLE",
            Self::SwitchPending => "E_SWITCH_PENDING",
            Self::NotConnected => "E_NOT_CONNECTED",
            Self::Timeout { .. } => "E_TIMEOUT",
            Self::Sdk(_) => "E_SDK",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::SwitchPending | Self::Timeout { .. } | Self::Sdk(_))
    }
}
