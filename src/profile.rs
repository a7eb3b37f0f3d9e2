//! User-info resolver: best-available profile for rendering.
//!
//! DESIGN
//! ======
//! After a restore, the SDK's user hook can lag the provider handle by a
//! noticeable amount. To avoid a blank profile, the resolver fetches the
//! profile directly once per provider-handle appearance. As soon as the hook
//! reports a profile it overwrites the fetched one and is not overwritten by
//! a fetch again for that session. When the session ends or is replaced by
//! another handle, the profile and its source are cleared so the next
//! session's fetch can land.
//!
//! ERROR HANDLING
//! ==============
//! Profile data is display-only. Fetch failures are logged and leave the
//! current profile untouched; there are no retries.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{ErrorCode, WalletError};
use crate::sdk::WalletSdk;
use crate::signal::{SessionHandle, SessionSignal, UserProfile};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProfileSource {
    #[default]
    None,
    Fetched,
    Hook,
}

#[derive(Debug, Default)]
pub struct UserInfoResolver {
    provider: Option<SessionHandle>,
    was_connecting: bool,
    fetched_for: Option<SessionHandle>,
    source: ProfileSource,
    profile: Option<UserProfile>,
}

impl UserInfoResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    #[must_use]
    pub fn source(&self) -> ProfileSource {
        self.source
    }

    /// Observe a snapshot; returns the handle to fetch for, if a fetch is due.
    pub fn on_signal(&mut self, signal: &SessionSignal) -> Option<SessionHandle> {
        let appeared = signal.provider.is_some() && signal.provider != self.provider;
        let connect_finished = self.was_connecting && !signal.connecting;

        if self.provider.is_some() && signal.provider != self.provider {
            debug!(previous = ?self.provider, "session ended; clearing profile");
            self.source = ProfileSource::None;
            self.profile = None;
            self.fetched_for = None;
        }

        self.provider.clone_from(&signal.provider);
        self.was_connecting = signal.connecting;

        let handle = signal.provider.as_ref()?;
        if appeared || (connect_finished && self.fetched_for.as_ref() != Some(handle)) {
            self.fetched_for = Some(handle.clone());
            return Some(handle.clone());
        }
        None
    }

    /// Apply a fetch result. Returns true when the profile changed.
    pub fn on_fetched(&mut self, handle: &SessionHandle, result: Result<Option<UserProfile>, WalletError>) -> bool {
        let profile = match result {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                debug!(%handle, "user info fetch returned nothing");
                return false;
            }
            Err(e) => {
                warn!(code = e.error_code(), error = %e, %handle, "user info fetch failed");
                return false;
            }
        };
        if self.provider.as_ref() != Some(handle) {
            debug!(%handle, "discarding user info for a superseded session");
            return false;
        }
        if self.source == ProfileSource::Hook {
            return false;
        }
        self.source = ProfileSource::Fetched;
        self.replace(profile)
    }

    /// Apply the hook-reported profile. Absent values never clear the profile.
    pub fn on_hook(&mut self, profile: Option<UserProfile>) -> bool {
        let Some(profile) = profile else {
            return false;
        };
        self.source = ProfileSource::Hook;
        self.replace(profile)
    }

    fn replace(&mut self, profile: UserProfile) -> bool {
        if self.profile.as_ref() == Some(&profile) {
            return false;
        }
        self.profile = Some(profile);
        true
    }
}

// =============================================================================
// DRIVER
// =============================================================================

type FetchResult = (SessionHandle, Result<Option<UserProfile>, WalletError>);

pub fn spawn_profile_resolver(
    sdk: Arc<dyn WalletSdk>,
    signals: watch::Receiver<SessionSignal>,
    hook: watch::Receiver<Option<UserProfile>>,
) -> (watch::Receiver<Option<UserProfile>>, JoinHandle<()>) {
    let (profile_tx, profile_rx) = watch::channel(None);
    let handle = tokio::spawn(run_profile_resolver(sdk, signals, hook, profile_tx));
    (profile_rx, handle)
}

async fn run_profile_resolver(
    sdk: Arc<dyn WalletSdk>,
    mut signals: watch::Receiver<SessionSignal>,
    mut hook: watch::Receiver<Option<UserProfile>>,
    profile_tx: watch::Sender<Option<UserProfile>>,
) {
    let (fetch_tx, mut fetch_rx) = mpsc::unbounded_channel::<FetchResult>();
    let mut resolver = UserInfoResolver::new();
    let mut signals_open = true;
    let mut hook_open = true;

    let initial_signal = signals.borrow_and_update().clone();
    observe(&sdk, &mut resolver, &initial_signal, &fetch_tx, &profile_tx);
    let initial_hook = hook.borrow_and_update().clone();
    if resolver.on_hook(initial_hook) {
        publish(&profile_tx, &resolver);
    }

    while signals_open || hook_open {
        tokio::select! {
            changed = signals.changed(), if signals_open => {
                if changed.is_err() {
                    signals_open = false;
                    continue;
                }
                let signal = signals.borrow_and_update().clone();
                observe(&sdk, &mut resolver, &signal, &fetch_tx, &profile_tx);
            }
            changed = hook.changed(), if hook_open => {
                if changed.is_err() {
                    hook_open = false;
                    continue;
                }
                let profile = hook.borrow_and_update().clone();
                if resolver.on_hook(profile) {
                    publish(&profile_tx, &resolver);
                }
            }
            Some((handle, result)) = fetch_rx.recv() => {
                if resolver.on_fetched(&handle, result) {
                    publish(&profile_tx, &resolver);
                }
            }
        }
    }
    debug!("signal sources closed; profile resolver stopping");
}

fn observe(
    sdk: &Arc<dyn WalletSdk>,
    resolver: &mut UserInfoResolver,
    signal: &SessionSignal,
    results: &mpsc::UnboundedSender<FetchResult>,
    profile_tx: &watch::Sender<Option<UserProfile>>,
) {
    let before = resolver.profile().cloned();
    if let Some(handle) = resolver.on_signal(signal) {
        spawn_fetch(sdk, handle, results);
    }
    if resolver.profile() != before.as_ref() {
        publish(profile_tx, resolver);
    }
}

fn spawn_fetch(sdk: &Arc<dyn WalletSdk>, handle: SessionHandle, results: &mpsc::UnboundedSender<FetchResult>) {
    debug!(%handle, "fetching user info");
    let sdk = Arc::clone(sdk);
    let results = results.clone();
    tokio::spawn(async move {
        let result = sdk.user_info(&handle).await;
        let _ = results.send((handle, result));
    });
}

fn publish(tx: &watch::Sender<Option<UserProfile>>, resolver: &UserInfoResolver) {
    tx.send_replace(resolver.profile().cloned());
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;
