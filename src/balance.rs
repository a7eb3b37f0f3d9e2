//! Balance tracker: native and USDC balances for the connected wallet.
//!
//! DESIGN
//! ======
//! The tracker keys every fetch on `(provider handle, address, chain id)`.
//! A key change starts a new fetch tagged with a fresh generation; results
//! that come back under an older generation are dropped, so a slow response
//! can never overwrite newer state, even after the key flips back (A→B→A).
//!
//! The native and token halves run concurrently and apply independently.
//! One failing does not hide the other's value; the view stays `loading`
//! until both halves of the current key have resolved.
//!
//! TRADE-OFFS
//! ==========
//! Balances are not polled. They refresh when the key changes, which covers
//! sign-in, account switches and chain switches. A top-up completing inside
//! the checkout modal shows up on the next key change or reload.

use std::sync::Arc;

use alloy_primitives::U256;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::{POLYGON_CHAIN_ID, SEPOLIA_CHAIN_ID};
use crate::error::ErrorCode;
use crate::rpc::{ChainRpc, RpcError, format_units};
use crate::signal::{SessionHandle, SessionSignal};

pub const NATIVE_DECIMALS: u8 = 18;
pub const TOKEN_SYMBOL: &str = "USDC";
const EMPTY_AMOUNT: &str = "0.00";

/// USDC contract for a chain, if the token is deployed there.
#[must_use]
pub fn usdc_address(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        POLYGON_CHAIN_ID => Some("0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174"),
        SEPOLIA_CHAIN_ID => Some("0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238"),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BalanceKey {
    pub provider: SessionHandle,
    pub address: String,
    pub chain_id: u64,
}

impl BalanceKey {
    /// Key for a snapshot; `None` until provider, address and chain are all known.
    #[must_use]
    pub fn from_signal(signal: &SessionSignal) -> Option<Self> {
        Some(Self {
            provider: signal.provider.clone()?,
            address: signal.address.clone()?,
            chain_id: signal.chain_id?,
        })
    }
}

/// One fetch started by the tracker. Results are matched on the whole
/// ticket, so two fetches for the same key are still told apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceFetch {
    pub key: BalanceKey,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceView {
    pub native: String,
    pub token: String,
    pub token_symbol: String,
    pub loading: bool,
    pub error: Option<String>,
}

impl Default for BalanceView {
    fn default() -> Self {
        Self {
            native: EMPTY_AMOUNT.to_string(),
            token: EMPTY_AMOUNT.to_string(),
            token_symbol: TOKEN_SYMBOL.to_string(),
            loading: false,
            error: None,
        }
    }
}

/// One completed half of a balance fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceHalf {
    Native(Result<U256, RpcError>),
    /// `(units, decimals)`; `None` when the chain has no token contract.
    Token(Result<Option<(U256, u8)>, RpcError>),
}

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug, Default)]
pub struct BalanceTracker {
    current: Option<BalanceFetch>,
    generation: u64,
    pending: u8,
    view: BalanceView,
}

impl BalanceTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn view(&self) -> &BalanceView {
        &self.view
    }

    /// Observe a snapshot; returns the fetch to run when one is due.
    pub fn on_signal(&mut self, signal: &SessionSignal) -> Option<BalanceFetch> {
        let key = BalanceKey::from_signal(signal);
        if key.as_ref() == self.current.as_ref().map(|f| &f.key) {
            return None;
        }
        match key {
            Some(key) => Some(self.begin(key)),
            None => {
                self.current = None;
                self.pending = 0;
                self.view = BalanceView::default();
                None
            }
        }
    }

    /// Start tracking `key`: both halves pending, previous values cleared.
    pub fn begin(&mut self, key: BalanceKey) -> BalanceFetch {
        self.generation += 1;
        let fetch = BalanceFetch { key, generation: self.generation };
        self.current = Some(fetch.clone());
        self.pending = 2;
        self.view = BalanceView { loading: true, ..BalanceView::default() };
        fetch
    }

    /// Apply a completed half. Returns true when the view changed.
    pub fn apply(&mut self, fetch: &BalanceFetch, half: BalanceHalf) -> bool {
        let key = &fetch.key;
        if self.current.as_ref() != Some(fetch) {
            debug!(
                chain_id = key.chain_id,
                address = %key.address,
                generation = fetch.generation,
                "discarding stale balance result"
            );
            return false;
        }
        let before = self.view.clone();

        let applied = match half {
            BalanceHalf::Native(result) => {
                result.and_then(|wei| format_units(wei, NATIVE_DECIMALS)).map(|v| self.view.native = v)
            }
            BalanceHalf::Token(Ok(Some((units, decimals)))) => {
                format_units(units, decimals).map(|v| self.view.token = v)
            }
            BalanceHalf::Token(Ok(None)) => Ok(()),
            BalanceHalf::Token(Err(e)) => Err(e),
        };
        if let Err(e) = applied {
            warn!(code = e.error_code(), error = %e, chain_id = key.chain_id, "balance fetch failed");
            if self.view.error.is_none() {
                self.view.error = Some(e.to_string());
            }
        }
        self.pending = self.pending.saturating_sub(1);
        self.view.loading = self.pending > 0;

        self.view != before
    }
}

// =============================================================================
// DRIVER
// =============================================================================

type HalfResult = (BalanceFetch, BalanceHalf);

pub fn spawn_balance_tracker(
    rpc: Arc<dyn ChainRpc>,
    signals: watch::Receiver<SessionSignal>,
) -> (watch::Receiver<BalanceView>, JoinHandle<()>) {
    let (view_tx, view_rx) = watch::channel(BalanceView::default());
    let handle = tokio::spawn(run_balance_tracker(rpc, signals, view_tx));
    (view_rx, handle)
}

async fn run_balance_tracker(
    rpc: Arc<dyn ChainRpc>,
    mut signals: watch::Receiver<SessionSignal>,
    view_tx: watch::Sender<BalanceView>,
) {
    let (half_tx, mut half_rx) = mpsc::unbounded_channel::<HalfResult>();
    let mut tracker = BalanceTracker::new();

    let initial = signals.borrow_and_update().clone();
    observe(&rpc, &mut tracker, &initial, &half_tx, &view_tx);

    loop {
        tokio::select! {
            changed = signals.changed() => {
                if changed.is_err() {
                    break;
                }
                let signal = signals.borrow_and_update().clone();
                observe(&rpc, &mut tracker, &signal, &half_tx, &view_tx);
            }
            Some((fetch, half)) = half_rx.recv() => {
                if tracker.apply(&fetch, half) {
                    view_tx.send_replace(tracker.view().clone());
                }
            }
        }
    }
    debug!("session signal closed; balance tracker stopping");
}

fn observe(
    rpc: &Arc<dyn ChainRpc>,
    tracker: &mut BalanceTracker,
    signal: &SessionSignal,
    results: &mpsc::UnboundedSender<HalfResult>,
    view_tx: &watch::Sender<BalanceView>,
) {
    let before = tracker.view().clone();
    if let Some(fetch) = tracker.on_signal(signal) {
        spawn_fetch(rpc, fetch, results);
    }
    if *tracker.view() != before {
        view_tx.send_replace(tracker.view().clone());
    }
}

fn spawn_fetch(rpc: &Arc<dyn ChainRpc>, fetch: BalanceFetch, results: &mpsc::UnboundedSender<HalfResult>) {
    debug!(
        chain_id = fetch.key.chain_id,
        address = %fetch.key.address,
        generation = fetch.generation,
        "fetching balances"
    );

    let native_rpc = Arc::clone(rpc);
    let native_fetch = fetch.clone();
    let native_tx = results.clone();
    tokio::spawn(async move {
        let key = &native_fetch.key;
        let result = native_rpc.native_balance(key.chain_id, &key.address).await;
        let _ = native_tx.send((native_fetch, BalanceHalf::Native(result)));
    });

    let token_rpc = Arc::clone(rpc);
    let token_tx = results.clone();
    tokio::spawn(async move {
        let result = fetch_token(token_rpc.as_ref(), &fetch.key).await;
        let _ = token_tx.send((fetch, BalanceHalf::Token(result)));
    });
}

/// One-shot fetch of both halves for `key`, outside any tracker task.
pub async fn fetch_balances(rpc: &dyn ChainRpc, key: &BalanceKey) -> BalanceView {
    let mut tracker = BalanceTracker::new();
    let fetch = tracker.begin(key.clone());
    let (native, token) = futures::join!(rpc.native_balance(key.chain_id, &key.address), fetch_token(rpc, key));
    tracker.apply(&fetch, BalanceHalf::Native(native));
    tracker.apply(&fetch, BalanceHalf::Token(token));
    tracker.view
}

async fn fetch_token(rpc: &dyn ChainRpc, key: &BalanceKey) -> Result<Option<(U256, u8)>, RpcError> {
    let Some(token) = usdc_address(key.chain_id) else {
        return Ok(None);
    };
    let (units, decimals) = futures::future::try_join(
        rpc.token_balance(key.chain_id, token, &key.address),
        rpc.token_decimals(key.chain_id, token),
    )
    .await?;
    Ok(Some((units, decimals)))
}

#[cfg(test)]
#[path = "balance_test.rs"]
mod tests;
