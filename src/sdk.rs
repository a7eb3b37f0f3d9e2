//! Embedded-wallet SDK seam.
//!
//! DESIGN
//! ======
//! The SDK is an external collaborator. The session core only needs these
//! six operations; state the SDK exposes as observables (provider handle,
//! connect status, address, chain) reaches the core through `SignalHub`
//! instead. Adapters that wrap a session object whose user-info lives on a
//! nested instance resolve that inside `user_info`.

use serde::Serialize;

use crate::error::WalletError;
use crate::signal::{SessionHandle, UserProfile};

/// Checkout modal configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub fiat_currencies: Vec<String>,
    pub settlement_tokens: Vec<String>,
}

/// Wallet UI funding view configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FundingViewRequest {
    pub path: String,
}

#[async_trait::async_trait]
pub trait WalletSdk: Send + Sync {
    async fn connect(&self) -> Result<(), WalletError>;

    async fn disconnect(&self) -> Result<(), WalletError>;

    /// Fetch the profile for a session. `Ok(None)` means the SDK had nothing.
    async fn user_info(&self, handle: &SessionHandle) -> Result<Option<UserProfile>, WalletError>;

    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError>;

    async fn open_checkout(&self, request: &CheckoutRequest) -> Result<(), WalletError>;

    async fn open_funding_view(&self, request: &FundingViewRequest) -> Result<(), WalletError>;
}
