//! Authentication reconciler: folds session signals into one `AuthState`.
//!
//! DESIGN
//! ======
//! The SDK gives no "restoration complete" callback, and the provider handle,
//! connect status and address each update on their own schedule. The state is
//! therefore recomputed from scratch on every snapshot by [`derive_auth_state`];
//! the only incremental state kept here is the settle phase and the login
//! classification captured on the `connected` rising edge.
//!
//! Settle step:
//! - provider handle present → wait a short grace delay so the connect
//!   status can catch up with the restored provider, then settle;
//! - no handle and no connect in flight → settle immediately;
//! - otherwise stay `Initializing`.
//!
//! Once settled, the state never returns to `Initializing`.
//!
//! TRADE-OFFS
//! ==========
//! The grace delay is a heuristic. Under a slow restore the connect status
//! may still lag it, but the provider handle alone already counts as
//! authenticated, so the user never sees the sign-in view for a restored
//! session.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::notice::NoticeSink;
use crate::signal::SessionSignal;
use crate::welcome::WelcomeNotifier;

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthState {
    #[default]
    Initializing,
    Unauthenticated,
    Authenticated,
}

/// How the session in front of us came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginKind {
    /// No restoration context existed when the connection was observed.
    New,
    /// The provider handle was already present when the connection was observed.
    Restored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SettlePhase {
    Pending,
    Grace { until: Instant },
    Settled,
}

/// Pure mapping from settle status and snapshot to `AuthState`.
///
/// Any one of provider handle, connected flag, or address is enough evidence
/// of a live session.
#[must_use]
pub fn derive_auth_state(settled: bool, signal: &SessionSignal) -> AuthState {
    if !settled {
        return AuthState::Initializing;
    }
    if signal.provider.is_some() || signal.connected || signal.address.is_some() {
        AuthState::Authenticated
    } else {
        AuthState::Unauthenticated
    }
}

// =============================================================================
// RECONCILER
// =============================================================================

#[derive(Debug)]
pub struct Reconciler {
    phase: SettlePhase,
    grace: Duration,
    was_connected: bool,
    login: Option<LoginKind>,
}

impl Reconciler {
    #[must_use]
    pub fn new(grace: Duration) -> Self {
        Self { phase: SettlePhase::Pending, grace, was_connected: false, login: None }
    }

    /// Feed one snapshot observed at `now` and return the resulting state.
    pub fn observe(&mut self, signal: &SessionSignal, now: Instant) -> AuthState {
        self.classify(signal);
        self.advance(signal, now);
        self.state(signal)
    }

    /// Current state for a snapshot without advancing the settle phase.
    #[must_use]
    pub fn state(&self, signal: &SessionSignal) -> AuthState {
        derive_auth_state(self.is_settled(), signal)
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.phase == SettlePhase::Settled
    }

    /// When the pending grace delay ends, if one is running.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        match self.phase {
            SettlePhase::Grace { until } => Some(until),
            SettlePhase::Pending | SettlePhase::Settled => None,
        }
    }

    /// Classification of the most recent connection, if not yet consumed.
    #[must_use]
    pub fn pending_login(&self) -> Option<LoginKind> {
        self.login
    }

    /// Consume the classification of the most recent connection.
    pub fn take_login(&mut self) -> Option<LoginKind> {
        self.login.take()
    }

    fn classify(&mut self, signal: &SessionSignal) {
        if signal.connected && !self.was_connected {
            let kind = if signal.provider.is_some() { LoginKind::Restored } else { LoginKind::New };
            debug!(?kind, "connection observed");
            self.login = Some(kind);
        }
        self.was_connected = signal.connected;
    }

    fn advance(&mut self, signal: &SessionSignal, now: Instant) {
        if self.phase == SettlePhase::Pending {
            if signal.provider.is_some() {
                self.phase = SettlePhase::Grace { until: now + self.grace };
            } else if !signal.connecting {
                self.phase = SettlePhase::Settled;
            }
        }
        if let SettlePhase::Grace { until } = self.phase {
            if now >= until {
                self.phase = SettlePhase::Settled;
            }
        }
    }
}

// =============================================================================
// DRIVER
// =============================================================================

/// Spawn the reconciler task. The welcome notifier rides along because it
/// consumes the login classification the moment the state settles.
pub fn spawn_reconciler(
    signals: watch::Receiver<SessionSignal>,
    grace: Duration,
    welcome: WelcomeNotifier,
    notices: NoticeSink,
) -> (watch::Receiver<AuthState>, JoinHandle<()>) {
    let (auth_tx, auth_rx) = watch::channel(AuthState::Initializing);
    let handle = tokio::spawn(run_reconciler(signals, Reconciler::new(grace), welcome, notices, auth_tx));
    (auth_rx, handle)
}

async fn run_reconciler(
    mut signals: watch::Receiver<SessionSignal>,
    mut reconciler: Reconciler,
    mut welcome: WelcomeNotifier,
    notices: NoticeSink,
    auth_tx: watch::Sender<AuthState>,
) {
    loop {
        let signal = signals.borrow_and_update().clone();
        let state = reconciler.observe(&signal, Instant::now());

        auth_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            info!(from = ?*current, to = ?state, "auth state changed");
            *current = state;
            true
        });

        if let Some(notice) = welcome.evaluate(&signal, state, &mut reconciler) {
            notices.show(notice);
        }

        let deadline = reconciler.deadline();
        tokio::select! {
            changed = signals.changed() => {
                if changed.is_err() {
                    debug!("signal source closed; reconciler stopping");
                    return;
                }
            }
            () = sleep_until_deadline(deadline) => {}
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "reconciler_test.rs"]
mod tests;
