//! Wallet session: composition root for the session core.
//!
//! DESIGN
//! ======
//! `WalletSession::start` wires every component to the same signal hub and
//! spawns one task per component:
//!
//! ```text
//! SignalHub ──► reconciler (+ welcome) ──► AuthState ──► chain guardian
//!     │                                        │
//!     ├──────► profile resolver ──► profile    └──► view
//!     └──────► balance tracker  ──► balances
//! ```
//!
//! Each task owns exactly one output channel; nothing else writes to it.
//! Dropping the session aborts all of them.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::balance::{BalanceView, spawn_balance_tracker};
use crate::chain_guard::ChainGuardian;
use crate::config::SessionConfig;
use crate::error::{ErrorCode, WalletError};
use crate::funding::{FundingError, FundingOrchestrator, FundingOutcome};
use crate::notice::{NoticeSink, UiEvent};
use crate::profile::spawn_profile_resolver;
use crate::reconciler::{AuthState, spawn_reconciler};
use crate::rpc::ChainRpc;
use crate::sdk::WalletSdk;
use crate::signal::{SessionSignal, SignalHub, UserProfile};
use crate::view::View;
use crate::welcome::WelcomeNotifier;

pub struct WalletSession {
    sdk: Arc<dyn WalletSdk>,
    signals: watch::Receiver<SessionSignal>,
    auth: watch::Receiver<AuthState>,
    profile: watch::Receiver<Option<UserProfile>>,
    balances: watch::Receiver<BalanceView>,
    funding: FundingOrchestrator,
    tasks: Vec<JoinHandle<()>>,
}

impl WalletSession {
    /// Spawn every session task. Must be called inside a Tokio runtime.
    ///
    /// Returns the session and the receiver for UI notices.
    #[must_use]
    pub fn start(
        hub: &SignalHub,
        sdk: Arc<dyn WalletSdk>,
        rpc: Arc<dyn ChainRpc>,
        config: &SessionConfig,
    ) -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (notices, notice_rx) = NoticeSink::channel();

        let (auth, reconciler_task) = spawn_reconciler(
            hub.subscribe(),
            config.settle_grace,
            WelcomeNotifier::new(config.welcome_duration),
            notices.clone(),
        );
        let (profile, profile_task) =
            spawn_profile_resolver(Arc::clone(&sdk), hub.subscribe(), hub.subscribe_hook_profile());
        let guardian_task = ChainGuardian::new(Arc::clone(&sdk), config.chain_guard).spawn(auth.clone(), hub.subscribe());
        let (balances, balance_task) = spawn_balance_tracker(rpc, hub.subscribe());

        info!(
            target_chain_id = config.chain_guard.target_chain_id,
            settle_grace_ms = config.settle_grace.as_millis(),
            "wallet session started"
        );

        let session = Self {
            funding: FundingOrchestrator::new(Arc::clone(&sdk), config.funding.clone(), notices),
            sdk,
            signals: hub.subscribe(),
            auth,
            profile,
            balances,
            tasks: vec![reconciler_task, profile_task, guardian_task, balance_task],
        };
        (session, notice_rx)
    }

    #[must_use]
    pub fn auth_state(&self) -> AuthState {
        *self.auth.borrow()
    }

    #[must_use]
    pub fn subscribe_auth(&self) -> watch::Receiver<AuthState> {
        self.auth.clone()
    }

    #[must_use]
    pub fn profile(&self) -> Option<UserProfile> {
        self.profile.borrow().clone()
    }

    #[must_use]
    pub fn balances(&self) -> BalanceView {
        self.balances.borrow().clone()
    }

    #[must_use]
    pub fn signal(&self) -> SessionSignal {
        self.signals.borrow().clone()
    }

    #[must_use]
    pub fn view(&self) -> View {
        let signal = self.signal();
        let profile = self.profile();
        View::from_parts(self.auth_state(), &signal, profile.as_ref())
    }

    /// Start the SDK's connect flow. Failures also land in the signal's
    /// `connect_error`, which the sign-in view renders inline.
    ///
    /// # Errors
    ///
    /// Returns the SDK error unchanged.
    pub async fn connect(&self) -> Result<(), WalletError> {
        self.sdk.connect().await.inspect_err(|e| {
            warn!(code = e.error_code(), retryable = e.retryable(), error = %e, "connect failed");
        })
    }

    /// # Errors
    ///
    /// Returns the SDK error unchanged.
    pub async fn disconnect(&self) -> Result<(), WalletError> {
        self.sdk.disconnect().await.inspect_err(|e| {
            warn!(code = e.error_code(), retryable = e.retryable(), error = %e, "disconnect failed");
        })
    }

    /// Open checkout for the current session.
    ///
    /// # Errors
    ///
    /// Returns [`FundingError::NotConnected`] when no provider handle exists.
    pub async fn trigger_funding(&self) -> Result<FundingOutcome, FundingError> {
        let provider = self.signals.borrow().provider.clone();
        self.funding.trigger(provider.as_ref()).await
    }
}

impl Drop for WalletSession {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
