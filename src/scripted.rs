//! Scripted SDK and RPC collaborators.
//!
//! SYSTEM CONTEXT
//! ==============
//! Used by trace replay (`topup replay`) and by the test suite. The scripted
//! SDK records every call, can be told which operations fail, and, when given
//! a `SignalHub`, publishes the same signal transitions the real SDK would
//! (connect in flight, connected before the provider handle, chain switched).

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::WalletError;
use crate::rpc::{ChainRpc, RpcError};
use crate::sdk::{CheckoutRequest, FundingViewRequest, WalletSdk};
use crate::signal::{SessionHandle, SignalHub, UserProfile};

pub const SCRIPTED_ADDRESS: &str = "0x1111111111111111111111111111111111111111";

/// Gap between `connected` flipping and the provider handle appearing.
/// Long enough that every signal reader sees the two as separate snapshots.
pub const PROVIDER_LAG: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SdkOp {
    Connect,
    Disconnect,
    UserInfo,
    SwitchChain,
    Checkout,
    FundingView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SdkCall {
    Connect,
    Disconnect,
    UserInfo { handle: SessionHandle },
    SwitchChain { chain_id: u64 },
    Checkout { request: CheckoutRequest },
    FundingView { request: FundingViewRequest },
}

// =============================================================================
// SCRIPTED SDK
// =============================================================================

#[derive(Default)]
pub struct ScriptedSdk {
    hub: Option<SignalHub>,
    profile: Option<UserProfile>,
    failing: HashSet<SdkOp>,
    latency: Duration,
    switching: AtomicBool,
    calls: Mutex<Vec<SdkCall>>,
}

impl ScriptedSdk {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish connect/disconnect/switch effects into `hub`.
    #[must_use]
    pub fn with_hub(mut self, hub: SignalHub) -> Self {
        self.hub = Some(hub);
        self
    }

    #[must_use]
    pub fn with_profile(mut self, profile: UserProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    #[must_use]
    pub fn failing(mut self, op: SdkOp) -> Self {
        self.failing.insert(op);
        self
    }

    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    #[must_use]
    pub fn calls(&self) -> Vec<SdkCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn count(&self, op: SdkOp) -> usize {
        self.calls().iter().filter(|call| call.op() == op).count()
    }

    fn record(&self, call: SdkCall) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(call);
    }

    /// Failures look like what the real SDK reports for each operation.
    fn outcome(&self, op: SdkOp) -> Result<(), WalletError> {
        if !self.failing.contains(&op) {
            return Ok(());
        }
        Err(match op {
            SdkOp::Connect => WalletError::Rejected("login modal closed".into()),
            _ => WalletError::Sdk(format!("scripted {op:?} failure")),
        })
    }

    /// Modals need a live session when the SDK is wired to a hub.
    fn require_session(&self) -> Result<(), WalletError> {
        match &self.hub {
            Some(hub) if hub.snapshot().provider.is_none() => Err(WalletError::NotConnected),
            _ => Ok(()),
        }
    }

    async fn wait(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl SdkCall {
    #[must_use]
    pub fn op(&self) -> SdkOp {
        match self {
            Self::Connect => SdkOp::Connect,
            Self::Disconnect => SdkOp::Disconnect,
            Self::UserInfo { .. } => SdkOp::UserInfo,
            Self::SwitchChain { .. } => SdkOp::SwitchChain,
            Self::Checkout { .. } => SdkOp::Checkout,
            Self::FundingView { .. } => SdkOp::FundingView,
        }
    }
}

/// Clears the in-flight switch flag, also when the caller gives up waiting.
struct PendingSwitch<'a>(&'a AtomicBool);

impl Drop for PendingSwitch<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl WalletSdk for ScriptedSdk {
    async fn connect(&self) -> Result<(), WalletError> {
        self.record(SdkCall::Connect);
        if let Some(hub) = &self.hub {
            hub.update(|s| {
                s.connecting = true;
                s.connect_error = None;
            });
        }
        self.wait().await;

        let outcome = self.outcome(SdkOp::Connect);
        if let Some(hub) = &self.hub {
            match &outcome {
                Ok(()) => {
                    // The SDK flips `connected` before it exposes the provider.
                    hub.update(|s| {
                        s.connecting = false;
                        s.connected = true;
                    });
                    tokio::time::sleep(PROVIDER_LAG).await;
                    hub.update(|s| {
                        s.provider = Some(SessionHandle::generate());
                        s.address = Some(SCRIPTED_ADDRESS.to_string());
                    });
                }
                Err(e) => hub.update(|s| {
                    s.connecting = false;
                    s.connect_error = Some(e.to_string());
                }),
            }
        }
        outcome
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        self.record(SdkCall::Disconnect);
        if let Some(hub) = &self.hub {
            hub.update(|s| {
                s.disconnecting = true;
                s.disconnect_error = None;
            });
        }
        self.wait().await;

        let outcome = self.outcome(SdkOp::Disconnect);
        if let Some(hub) = &self.hub {
            match &outcome {
                Ok(()) => hub.update(|s| {
                    s.disconnecting = false;
                    s.connected = false;
                    s.provider = None;
                    s.address = None;
                }),
                Err(e) => hub.update(|s| {
                    s.disconnecting = false;
                    s.disconnect_error = Some(e.to_string());
                }),
            }
        }
        outcome
    }

    async fn user_info(&self, handle: &SessionHandle) -> Result<Option<UserProfile>, WalletError> {
        self.record(SdkCall::UserInfo { handle: handle.clone() });
        self.wait().await;
        self.outcome(SdkOp::UserInfo)?;
        Ok(self.profile.clone())
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError> {
        self.record(SdkCall::SwitchChain { chain_id });
        if self.switching.swap(true, Ordering::SeqCst) {
            return Err(WalletError::SwitchPending);
        }
        let pending = PendingSwitch(&self.switching);
        self.wait().await;
        drop(pending);

        if self.failing.contains(&SdkOp::SwitchChain) {
            return Err(WalletError::ChainUnavailable(chain_id));
        }
        if let Some(hub) = &self.hub {
            hub.update(|s| s.chain_id = Some(chain_id));
        }
        Ok(())
    }

    async fn open_checkout(&self, request: &CheckoutRequest) -> Result<(), WalletError> {
        self.record(SdkCall::Checkout { request: request.clone() });
        self.require_session()?;
        self.wait().await;
        self.outcome(SdkOp::Checkout)
    }

    async fn open_funding_view(&self, request: &FundingViewRequest) -> Result<(), WalletError> {
        self.record(SdkCall::FundingView { request: request.clone() });
        self.require_session()?;
        self.wait().await;
        self.outcome(SdkOp::FundingView)
    }
}

// =============================================================================
// SCRIPTED RPC
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcOp {
    NativeBalance,
    TokenBalance,
    TokenDecimals,
}

/// Fixed balances for every address and chain.
pub struct ScriptedRpc {
    pub native_wei: U256,
    pub token_units: U256,
    pub token_decimals: u8,
    failing: HashSet<RpcOp>,
    latency: Duration,
    calls: Mutex<Vec<(RpcOp, u64)>>,
}

impl Default for ScriptedRpc {
    fn default() -> Self {
        Self {
            native_wei: U256::ZERO,
            token_units: U256::ZERO,
            token_decimals: 6,
            failing: HashSet::new(),
            latency: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedRpc {
    #[must_use]
    pub fn new(native_wei: U256, token_units: U256) -> Self {
        Self { native_wei, token_units, ..Self::default() }
    }

    #[must_use]
    pub fn failing(mut self, op: RpcOp) -> Self {
        self.failing.insert(op);
        self
    }

    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Every call so far as `(operation, chain id)`.
    #[must_use]
    pub fn calls(&self) -> Vec<(RpcOp, u64)> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    async fn call(&self, op: RpcOp, chain_id: u64) -> Result<(), RpcError> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push((op, chain_id));
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.failing.contains(&op) {
            return Err(RpcError::Transport(format!("scripted {op:?} failure")));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ChainRpc for ScriptedRpc {
    async fn native_balance(&self, chain_id: u64, _address: &str) -> Result<U256, RpcError> {
        self.call(RpcOp::NativeBalance, chain_id).await?;
        Ok(self.native_wei)
    }

    async fn token_balance(&self, chain_id: u64, _token: &str, _owner: &str) -> Result<U256, RpcError> {
        self.call(RpcOp::TokenBalance, chain_id).await?;
        Ok(self.token_units)
    }

    async fn token_decimals(&self, chain_id: u64, _token: &str) -> Result<u8, RpcError> {
        self.call(RpcOp::TokenDecimals, chain_id).await?;
        Ok(self.token_decimals)
    }
}

#[cfg(test)]
#[path = "scripted_test.rs"]
mod tests;
