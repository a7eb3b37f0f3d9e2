//! Signal sources published by the embedded-wallet SDK.
//!
//! ARCHITECTURE
//! ============
//! The SDK adapter owns a [`SignalHub`] and writes every observable it has
//! (provider handle, connect/disconnect status, address, chain id, and the
//! hook-reported profile) into `watch` channels. The session core only holds
//! receivers and reads snapshots; it never writes back.
//!
//! TRADE-OFFS
//! ==========
//! All session fields share one channel so readers always see a coherent
//! snapshot. The hook profile has its own channel because it updates on a
//! different cadence and only the profile resolver cares about it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::seed::InitialState;

// =============================================================================
// SESSION HANDLE
// =============================================================================

/// Opaque reference to a live or restored SDK session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHandle(String);

impl SessionHandle {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random handle, used by scripted sessions.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// USER PROFILE
// =============================================================================

/// Display data for the signed-in user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub profile_image: Option<String>,
}

// =============================================================================
// SESSION SIGNAL
// =============================================================================

/// One snapshot of every session observable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSignal {
    /// Provider handle, present once a session is live or restored.
    pub provider: Option<SessionHandle>,
    pub connected: bool,
    /// A connect operation is in flight.
    pub connecting: bool,
    pub connect_error: Option<String>,
    pub disconnecting: bool,
    pub disconnect_error: Option<String>,
    pub address: Option<String>,
    pub chain_id: Option<u64>,
}

impl SessionSignal {
    /// Snapshot seeded from the cookie-derived initial state.
    #[must_use]
    pub fn seeded(seed: &InitialState) -> Self {
        Self { provider: seed.provider.clone(), chain_id: seed.chain_id, ..Self::default() }
    }
}

// =============================================================================
// SIGNAL HUB
// =============================================================================

/// Writer side of the signal channels. Cheap to clone.
#[derive(Clone)]
pub struct SignalHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    session: watch::Sender<SessionSignal>,
    hook_profile: watch::Sender<Option<UserProfile>>,
}

impl SignalHub {
    /// Create a hub whose first snapshot already carries the seed.
    #[must_use]
    pub fn new(seed: &InitialState) -> Self {
        Self::with_signal(SessionSignal::seeded(seed))
    }

    #[must_use]
    pub fn with_signal(initial: SessionSignal) -> Self {
        let (session, _) = watch::channel(initial);
        let (hook_profile, _) = watch::channel(None);
        Self { inner: Arc::new(HubInner { session, hook_profile }) }
    }

    /// Apply a mutation to the session snapshot. Readers are only woken
    /// when the snapshot actually changed.
    pub fn update(&self, f: impl FnOnce(&mut SessionSignal)) {
        self.inner.session.send_if_modified(|signal| {
            let before = signal.clone();
            f(signal);
            *signal != before
        });
    }

    /// Publish the profile reported by the SDK's user hook.
    pub fn set_hook_profile(&self, profile: Option<UserProfile>) {
        self.inner.hook_profile.send_if_modified(|current| {
            if *current == profile {
                return false;
            }
            *current = profile;
            true
        });
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSignal {
        self.inner.session.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSignal> {
        self.inner.session.subscribe()
    }

    #[must_use]
    pub fn subscribe_hook_profile(&self) -> watch::Receiver<Option<UserProfile>> {
        self.inner.hook_profile.subscribe()
    }
}

#[cfg(test)]
#[path = "signal_test.rs"]
mod tests;
