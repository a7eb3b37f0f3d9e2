//! Chain guardian: keeps an authenticated wallet on the required chain.
//!
//! DESIGN
//! ======
//! Inputs are `(authenticated, chain id, provider handle, address)`. Whenever
//! any of them changes, including an account switch or a new handle on the
//! same chain, the guardian waits for a quiet debounce window so it
//! does not race the SDK's own initialization, then issues at most one silent
//! switch request if the chain is wrong.
//!
//! Switch requests run inline in the guardian task. A second request cannot
//! start until the first resolves or hits the timeout, no matter how short the
//! debounce window is relative to the wallet's switch latency.
//!
//! ERROR HANDLING
//! ==============
//! Switching is a convenience. Failures (chain missing from the wallet, a
//! switch already pending) are logged and never surfaced.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ChainGuardConfig;
use crate::error::{ErrorCode, WalletError};
use crate::reconciler::AuthState;
use crate::sdk::WalletSdk;
use crate::signal::{SessionHandle, SessionSignal};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardInputs {
    pub authenticated: bool,
    pub chain_id: Option<u64>,
    pub provider: Option<SessionHandle>,
    pub address: Option<String>,
}

impl GuardInputs {
    #[must_use]
    pub fn capture(auth: AuthState, signal: &SessionSignal) -> Self {
        Self {
            authenticated: auth == AuthState::Authenticated,
            chain_id: signal.chain_id,
            provider: signal.provider.clone(),
            address: signal.address.clone(),
        }
    }

    /// True when a switch to `target` should be requested. An unknown chain
    /// id means the SDK has not finished initializing; wait for it.
    #[must_use]
    pub fn needs_switch(&self, target: u64) -> bool {
        self.authenticated
            && self.provider.is_some()
            && self.address.is_some()
            && self.chain_id.is_some_and(|chain| chain != target)
    }
}

pub struct ChainGuardian {
    sdk: Arc<dyn WalletSdk>,
    config: ChainGuardConfig,
}

impl ChainGuardian {
    #[must_use]
    pub fn new(sdk: Arc<dyn WalletSdk>, config: ChainGuardConfig) -> Self {
        Self { sdk, config }
    }

    pub fn spawn(self, auth: watch::Receiver<AuthState>, signals: watch::Receiver<SessionSignal>) -> JoinHandle<()> {
        tokio::spawn(self.run(auth, signals))
    }

    async fn run(self, mut auth: watch::Receiver<AuthState>, mut signals: watch::Receiver<SessionSignal>) {
        info!(
            target_chain_id = self.config.target_chain_id,
            debounce_ms = self.config.debounce.as_millis(),
            "chain guardian started"
        );
        let mut inputs = capture(&mut auth, &mut signals);

        loop {
            // Debounce: the window restarts only when the inputs actually change.
            let mut deadline = Instant::now() + self.config.debounce;
            loop {
                tokio::select! {
                    () = tokio::time::sleep_until(deadline) => break,
                    changed = auth.changed() => if changed.is_err() { return; },
                    changed = signals.changed() => if changed.is_err() { return; },
                }
                let latest = capture(&mut auth, &mut signals);
                if latest != inputs {
                    inputs = latest;
                    deadline = Instant::now() + self.config.debounce;
                }
            }

            if inputs.needs_switch(self.config.target_chain_id) {
                self.switch(inputs.chain_id).await;
            } else {
                debug!(?inputs, "chain guardian: no switch needed");
            }

            // Wait for the next real input change.
            loop {
                tokio::select! {
                    changed = auth.changed() => if changed.is_err() { return; },
                    changed = signals.changed() => if changed.is_err() { return; },
                }
                let latest = capture(&mut auth, &mut signals);
                if latest != inputs {
                    inputs = latest;
                    break;
                }
            }
        }
    }

    async fn switch(&self, from: Option<u64>) {
        let target = self.config.target_chain_id;
        info!(?from, target, "switching to required chain");
        let result = match tokio::time::timeout(self.config.switch_timeout, self.sdk.switch_chain(target)).await {
            Ok(result) => result,
            Err(_) => Err(WalletError::Timeout {
                operation: "switch_chain",
                after_ms: u64::try_from(self.config.switch_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };
        if let Err(e) = result {
            warn!(
                code = e.error_code(),
                retryable = e.retryable(),
                error = %e,
                target,
                "automatic chain switch failed"
            );
        }
    }
}

fn capture(auth: &mut watch::Receiver<AuthState>, signals: &mut watch::Receiver<SessionSignal>) -> GuardInputs {
    let state = *auth.borrow_and_update();
    GuardInputs::capture(state, &signals.borrow_and_update())
}

#[cfg(test)]
#[path = "chain_guard_test.rs"]
mod tests;
