//! Trace replay: drive a full session from a JSON script.
//!
//! SYSTEM CONTEXT
//! ==============
//! Signal races are easier to reproduce from a script than from a browser.
//! A script seeds the initial signal snapshot, then applies timed steps:
//! signal patches, hook profile updates, and user actions (connect,
//! disconnect, fund). The session runs against the scripted SDK and RPC,
//! and the report lists every auth transition with its elapsed time, every
//! UI event, and every SDK call.
//!
//! ```json
//! {
//!   "initial": { "provider": "restored-1", "chainId": 1 },
//!   "steps": [
//!     { "at_ms": 50, "patch": { "connected": true, "address": "0xabc..." } },
//!     { "at_ms": 900, "action": "fund" }
//!   ],
//!   "tail_ms": 1000
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::balance::BalanceView;
use crate::config::SessionConfig;
use crate::error::ErrorCode;
use crate::funding::FundingOutcome;
use crate::notice::UiEvent;
use crate::reconciler::AuthState;
use crate::rpc::ChainRpc;
use crate::scripted::{SdkCall, SdkOp, ScriptedRpc, ScriptedSdk};
use crate::sdk::WalletSdk;
use crate::session::WalletSession;
use crate::signal::{SessionHandle, SessionSignal, SignalHub, UserProfile};
use crate::view::View;

const DEFAULT_TAIL_MS: u64 = 1_000;

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("invalid replay script: {0}")]
    Script(#[from] serde_json::Error),
    #[error("transition recorder failed: {0}")]
    Recorder(#[from] tokio::task::JoinError),
}

impl ErrorCode for ReplayError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Script(_) => "E_REPLAY_SCRIPT",
            Self::Recorder(_) => "E_REPLAY_RECORDER",
        }
    }
}

// =============================================================================
// SCRIPT
// =============================================================================

/// Partial update to a [`SessionSignal`]. Absent fields are left alone;
/// nullable fields accept an explicit `null` to clear them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SignalPatch {
    #[serde(default, deserialize_with = "double_option")]
    pub provider: Option<Option<SessionHandle>>,
    pub connected: Option<bool>,
    pub connecting: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub connect_error: Option<Option<String>>,
    pub disconnecting: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub disconnect_error: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub chain_id: Option<Option<u64>>,
}

impl SignalPatch {
    pub fn apply(&self, signal: &mut SessionSignal) {
        if let Some(v) = &self.provider {
            signal.provider.clone_from(v);
        }
        if let Some(v) = self.connected {
            signal.connected = v;
        }
        if let Some(v) = self.connecting {
            signal.connecting = v;
        }
        if let Some(v) = &self.connect_error {
            signal.connect_error.clone_from(v);
        }
        if let Some(v) = self.disconnecting {
            signal.disconnecting = v;
        }
        if let Some(v) = &self.disconnect_error {
            signal.disconnect_error.clone_from(v);
        }
        if let Some(v) = &self.address {
            signal.address.clone_from(v);
        }
        if let Some(v) = self.chain_id {
            signal.chain_id = v;
        }
    }
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayAction {
    Connect,
    Disconnect,
    Fund,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplayStep {
    /// Offset from replay start. Steps run in order; a step never runs early.
    pub at_ms: u64,
    #[serde(default)]
    pub patch: Option<SignalPatch>,
    #[serde(default)]
    pub action: Option<ReplayAction>,
    #[serde(default, deserialize_with = "double_option")]
    pub hook_profile: Option<Option<UserProfile>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplayScript {
    #[serde(default)]
    pub initial: SignalPatch,
    #[serde(default)]
    pub steps: Vec<ReplayStep>,
    /// Profile returned by the scripted SDK's user-info call.
    #[serde(default)]
    pub profile: Option<UserProfile>,
    /// SDK operations that fail.
    #[serde(default)]
    pub fail: Vec<SdkOp>,
    /// How long to keep running after the last step.
    #[serde(default = "default_tail_ms")]
    pub tail_ms: u64,
}

fn default_tail_ms() -> u64 {
    DEFAULT_TAIL_MS
}

impl ReplayScript {
    /// # Errors
    ///
    /// Returns [`ReplayError::Script`] when the JSON does not describe a script.
    pub fn from_json(raw: &str) -> Result<Self, ReplayError> {
        Ok(serde_json::from_str(raw)?)
    }
}

// =============================================================================
// REPORT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub at_ms: u64,
    pub state: AuthState,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub transitions: Vec<Transition>,
    pub notices: Vec<UiEvent>,
    pub sdk_calls: Vec<SdkCall>,
    pub funding: Vec<FundingOutcome>,
    pub final_view: View,
    pub balances: BalanceView,
}

// =============================================================================
// RUNNER
// =============================================================================

/// Run `script` to completion and report what the session did.
///
/// # Errors
///
/// Returns [`ReplayError::Recorder`] if the transition recorder panics.
pub async fn run_replay(script: ReplayScript, config: &SessionConfig) -> Result<ReplayReport, ReplayError> {
    let mut initial = SessionSignal::default();
    script.initial.apply(&mut initial);
    let hub = SignalHub::with_signal(initial);

    let mut sdk = ScriptedSdk::new().with_hub(hub.clone());
    if let Some(profile) = script.profile.clone() {
        sdk = sdk.with_profile(profile);
    }
    for op in &script.fail {
        sdk = sdk.failing(*op);
    }
    let sdk = Arc::new(sdk);
    let rpc: Arc<dyn ChainRpc> = Arc::new(ScriptedRpc::default());

    let started = Instant::now();
    let (session, mut notice_rx) = WalletSession::start(&hub, Arc::clone(&sdk) as Arc<dyn WalletSdk>, rpc, config);
    let mut auth = session.subscribe_auth();
    let first = Transition { at_ms: 0, state: *auth.borrow_and_update() };
    let recorder = tokio::spawn(record_transitions(auth, first, started));

    let mut steps = script.steps;
    steps.sort_by_key(|s| s.at_ms);
    let mut funding = Vec::new();

    for step in &steps {
        tokio::time::sleep_until(started + Duration::from_millis(step.at_ms)).await;
        if let Some(patch) = &step.patch {
            hub.update(|s| patch.apply(s));
        }
        if let Some(profile) = &step.hook_profile {
            hub.set_hook_profile(profile.clone());
        }
        match step.action {
            Some(ReplayAction::Connect) => {
                let _ = session.connect().await;
            }
            Some(ReplayAction::Disconnect) => {
                let _ = session.disconnect().await;
            }
            Some(ReplayAction::Fund) => match session.trigger_funding().await {
                Ok(outcome) => funding.push(outcome),
                Err(e) => warn!(code = e.error_code(), error = %e, "replayed funding rejected"),
            },
            None => {}
        }
    }
    tokio::time::sleep(Duration::from_millis(script.tail_ms)).await;

    let final_view = session.view();
    let balances = session.balances();
    drop(session);
    let transitions = recorder.await?;

    let mut notices = Vec::new();
    while let Ok(event) = notice_rx.try_recv() {
        notices.push(event);
    }

    info!(steps = steps.len(), transitions = transitions.len(), "replay finished");
    Ok(ReplayReport { transitions, notices, sdk_calls: sdk.calls(), funding, final_view, balances })
}

async fn record_transitions(
    mut auth: watch::Receiver<AuthState>,
    first: Transition,
    started: Instant,
) -> Vec<Transition> {
    let mut transitions = vec![first];
    while auth.changed().await.is_ok() {
        let state = *auth.borrow_and_update();
        let at_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        transitions.push(Transition { at_ms, state });
    }
    transitions
}

#[cfg(test)]
#[path = "replay_test.rs"]
mod tests;
