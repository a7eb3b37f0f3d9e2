use std::time::Duration;

use super::*;
use crate::scripted::{RpcOp, ScriptedRpc};
use crate::signal::SignalHub;

const ADDRESS: &str = "0x1111111111111111111111111111111111111111";
const ONE_AND_HALF_ETH: u64 = 1_500_000_000_000_000_000;
const TWO_USDC: u64 = 2_000_000;

fn units(n: u64) -> U256 {
    U256::from(n)
}

fn ready(chain_id: u64) -> SessionSignal {
    SessionSignal {
        provider: Some(SessionHandle::new("h")),
        connected: true,
        address: Some(ADDRESS.into()),
        chain_id: Some(chain_id),
        ..SessionSignal::default()
    }
}

#[test]
fn usdc_table_covers_polygon_and_sepolia() {
    assert_eq!(usdc_address(137), Some("0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174"));
    assert_eq!(usdc_address(11_155_111), Some("0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238"));
    assert_eq!(usdc_address(1), None);
}

#[test]
fn key_needs_provider_address_and_chain() {
    assert!(BalanceKey::from_signal(&ready(137)).is_some());
    assert!(BalanceKey::from_signal(&SessionSignal { provider: None, ..ready(137) }).is_none());
    assert!(BalanceKey::from_signal(&SessionSignal { address: None, ..ready(137) }).is_none());
    assert!(BalanceKey::from_signal(&SessionSignal { chain_id: None, ..ready(137) }).is_none());
}

// =============================================================
// Tracker state
// =============================================================

#[test]
fn both_halves_resolve_before_loading_clears() {
    let mut tracker = BalanceTracker::new();
    let fetch = tracker.on_signal(&ready(137)).unwrap();
    assert!(tracker.view().loading);

    assert!(tracker.apply(&fetch, BalanceHalf::Native(Ok(units(ONE_AND_HALF_ETH)))));
    assert_eq!(tracker.view().native, "1.5");
    assert!(tracker.view().loading);

    assert!(tracker.apply(&fetch, BalanceHalf::Token(Ok(Some((units(TWO_USDC), 6))))));
    assert_eq!(tracker.view().token, "2.0");
    assert!(!tracker.view().loading);
    assert_eq!(tracker.view().error, None);
}

#[test]
fn one_half_failing_keeps_the_other() {
    let mut tracker = BalanceTracker::new();
    let fetch = tracker.on_signal(&ready(137)).unwrap();

    tracker.apply(&fetch, BalanceHalf::Native(Err(RpcError::Transport("down".into()))));
    tracker.apply(&fetch, BalanceHalf::Token(Ok(Some((units(5_250_000), 6)))));

    let view = tracker.view();
    assert_eq!(view.native, "0.00");
    assert_eq!(view.token, "5.25");
    assert!(!view.loading);
    assert_eq!(view.error.as_deref(), Some("RPC request failed: down"));
}

#[test]
fn first_error_is_kept() {
    let mut tracker = BalanceTracker::new();
    let fetch = tracker.on_signal(&ready(137)).unwrap();
    tracker.apply(&fetch, BalanceHalf::Native(Err(RpcError::NoEndpoint(137))));
    tracker.apply(&fetch, BalanceHalf::Token(Err(RpcError::Parse("junk".into()))));
    assert_eq!(tracker.view().error.as_deref(), Some("no RPC endpoint configured for chain 137"));
}

#[test]
fn stale_result_is_discarded() {
    let mut tracker = BalanceTracker::new();
    let old = tracker.on_signal(&ready(137)).unwrap();
    let new = tracker.on_signal(&ready(11_155_111)).unwrap();

    assert!(!tracker.apply(&old, BalanceHalf::Native(Ok(units(ONE_AND_HALF_ETH)))));
    assert_eq!(tracker.view().native, "0.00");

    assert!(tracker.apply(&new, BalanceHalf::Native(Ok(units(ONE_AND_HALF_ETH)))));
    assert_eq!(tracker.view().native, "1.5");
}

#[test]
fn result_from_an_earlier_fetch_of_the_same_key_is_discarded() {
    let mut tracker = BalanceTracker::new();
    let first = tracker.on_signal(&ready(137)).unwrap();
    tracker.on_signal(&ready(11_155_111)).unwrap();
    let again = tracker.on_signal(&ready(137)).unwrap();
    assert_eq!(first.key, again.key);
    assert_ne!(first.generation, again.generation);

    assert!(!tracker.apply(&first, BalanceHalf::Native(Ok(units(ONE_AND_HALF_ETH)))));
    assert!(!tracker.apply(&first, BalanceHalf::Token(Ok(Some((units(TWO_USDC), 6))))));
    assert!(tracker.view().loading);
    assert_eq!(tracker.view().native, "0.00");

    tracker.apply(&again, BalanceHalf::Native(Ok(units(ONE_AND_HALF_ETH))));
    assert!(tracker.view().loading);
    tracker.apply(&again, BalanceHalf::Token(Ok(Some((units(TWO_USDC), 6)))));
    assert!(!tracker.view().loading);
}

#[test]
fn unformattable_token_amount_is_reported() {
    let mut tracker = BalanceTracker::new();
    let fetch = tracker.on_signal(&ready(137)).unwrap();
    tracker.apply(&fetch, BalanceHalf::Native(Ok(units(ONE_AND_HALF_ETH))));
    tracker.apply(&fetch, BalanceHalf::Token(Ok(Some((units(TWO_USDC), 200)))));

    assert_eq!(tracker.view().native, "1.5");
    assert_eq!(tracker.view().token, "0.00");
    assert!(tracker.view().error.as_deref().is_some_and(|e| e.starts_with("cannot format amount")));
    assert!(!tracker.view().loading);
}

#[test]
fn unchanged_key_does_not_refetch() {
    let mut tracker = BalanceTracker::new();
    assert!(tracker.on_signal(&ready(137)).is_some());
    let noise = SessionSignal { disconnect_error: Some("x".into()), ..ready(137) };
    assert!(tracker.on_signal(&noise).is_none());
}

#[test]
fn losing_the_key_resets_the_view() {
    let mut tracker = BalanceTracker::new();
    let fetch = tracker.on_signal(&ready(137)).unwrap();
    tracker.apply(&fetch, BalanceHalf::Native(Ok(units(ONE_AND_HALF_ETH))));

    assert!(tracker.on_signal(&SessionSignal::default()).is_none());
    assert_eq!(*tracker.view(), BalanceView::default());
}

// =============================================================
// Driver task
// =============================================================

fn start(rpc: ScriptedRpc, signal: SessionSignal) -> (Arc<ScriptedRpc>, SignalHub, watch::Receiver<BalanceView>) {
    let rpc = Arc::new(rpc);
    let hub = SignalHub::with_signal(signal);
    let (view, _task) = spawn_balance_tracker(Arc::clone(&rpc) as Arc<dyn ChainRpc>, hub.subscribe());
    (rpc, hub, view)
}

#[tokio::test(start_paused = true)]
async fn fetches_native_and_token_for_ready_wallet() {
    let (rpc, _hub, view) = start(ScriptedRpc::new(units(ONE_AND_HALF_ETH), units(TWO_USDC)), ready(137));

    tokio::time::sleep(Duration::from_millis(10)).await;
    let view = view.borrow().clone();
    assert_eq!(view.native, "1.5");
    assert_eq!(view.token, "2.0");
    assert_eq!(view.token_symbol, "USDC");
    assert!(!view.loading);

    let mut ops: Vec<RpcOp> = rpc.calls().into_iter().map(|(op, _)| op).collect();
    ops.sort_by_key(|op| *op as u8);
    assert_eq!(ops, vec![RpcOp::NativeBalance, RpcOp::TokenBalance, RpcOp::TokenDecimals]);
}

#[tokio::test(start_paused = true)]
async fn chain_without_token_skips_token_queries() {
    let (rpc, _hub, view) = start(ScriptedRpc::new(units(ONE_AND_HALF_ETH), units(TWO_USDC)), ready(1));

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(view.borrow().token, "0.00");
    assert_eq!(rpc.calls(), vec![(RpcOp::NativeBalance, 1)]);
}

#[tokio::test(start_paused = true)]
async fn token_failure_does_not_hide_native_balance() {
    let (_rpc, _hub, view) = start(
        ScriptedRpc::new(units(ONE_AND_HALF_ETH), units(TWO_USDC)).failing(RpcOp::TokenDecimals),
        ready(137),
    );

    tokio::time::sleep(Duration::from_millis(10)).await;
    let view = view.borrow().clone();
    assert_eq!(view.native, "1.5");
    assert_eq!(view.token, "0.00");
    assert!(view.error.is_some());
    assert!(!view.loading);
}

#[tokio::test(start_paused = true)]
async fn slow_result_after_disconnect_is_dropped() {
    let (_rpc, hub, view) = start(
        ScriptedRpc::new(units(ONE_AND_HALF_ETH), units(TWO_USDC)).with_latency(Duration::from_secs(1)),
        ready(137),
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(view.borrow().loading);

    hub.update(|s| {
        s.provider = None;
        s.address = None;
        s.connected = false;
    });
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(*view.borrow(), BalanceView::default());
}

#[tokio::test]
async fn one_shot_fetch_settles_both_halves() {
    let rpc = ScriptedRpc::new(units(ONE_AND_HALF_ETH), units(TWO_USDC));
    let key = BalanceKey { provider: SessionHandle::new("cli"), address: ADDRESS.into(), chain_id: 137 };

    let view = fetch_balances(&rpc, &key).await;
    assert_eq!(view.native, "1.5");
    assert_eq!(view.token, "2.0");
    assert!(!view.loading);
}
