use std::time::Duration;

use alloy_primitives::U256;

use super::*;
use crate::funding::FUNDING_NOTICE_ID;
use crate::notice::NoticeKind;
use crate::scripted::{SCRIPTED_ADDRESS, SdkCall, SdkOp, ScriptedRpc, ScriptedSdk};
use crate::signal::SessionHandle;

const ONE_POL: u64 = 1_000_000_000_000_000_000;

struct Harness {
    hub: SignalHub,
    sdk: Arc<ScriptedSdk>,
    session: WalletSession,
    notices: mpsc::UnboundedReceiver<UiEvent>,
}

fn start(initial: SessionSignal, sdk: ScriptedSdk) -> Harness {
    let hub = SignalHub::with_signal(initial);
    let sdk = Arc::new(sdk.with_hub(hub.clone()));
    let rpc = Arc::new(ScriptedRpc::new(U256::from(ONE_POL), U256::from(12_340_000u64)));
    let (session, notices) = WalletSession::start(
        &hub,
        Arc::clone(&sdk) as Arc<dyn WalletSdk>,
        rpc as Arc<dyn ChainRpc>,
        &SessionConfig::default(),
    );
    Harness { hub, sdk, session, notices }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<UiEvent>) -> Vec<UiEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn welcome_count(events: &[UiEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, UiEvent::Show(n) if n.kind == NoticeKind::Welcome))
        .count()
}

#[tokio::test(start_paused = true)]
async fn fresh_visit_lands_on_sign_in() {
    let h = start(SessionSignal::default(), ScriptedSdk::new());
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(h.session.auth_state(), AuthState::Unauthenticated);
    assert_eq!(h.session.view(), View::SignIn { connecting: false, connect_error: None });
}

#[tokio::test(start_paused = true)]
async fn new_login_welcomes_once_and_moves_to_required_chain() {
    let profile = UserProfile { name: Some("Ada".into()), email: Some("ada@example.com".into()), profile_image: None };
    let mut h = start(
        SessionSignal { chain_id: Some(1), ..SessionSignal::default() },
        ScriptedSdk::new().with_profile(profile.clone()),
    );
    tokio::time::sleep(Duration::from_millis(10)).await;

    h.session.connect().await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(h.session.auth_state(), AuthState::Authenticated);
    assert_eq!(h.session.profile(), Some(profile));
    assert_eq!(h.hub.snapshot().chain_id, Some(137));
    assert_eq!(h.sdk.count(SdkOp::SwitchChain), 1);
    assert_eq!(welcome_count(&drain(&mut h.notices)), 1);

    let balances = h.session.balances();
    assert_eq!(balances.native, "1.0");
    assert_eq!(balances.token, "12.34");

    match h.session.view() {
        View::Dashboard { address, name, .. } => {
            assert_eq!(address, Some(crate::view::truncate_address(SCRIPTED_ADDRESS)));
            assert_eq!(name, "Ada");
        }
        other => panic!("expected dashboard, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn restored_session_skips_sign_in_and_welcome() {
    let restored = SessionSignal {
        provider: Some(SessionHandle::new("restored")),
        chain_id: Some(137),
        ..SessionSignal::default()
    };
    let mut h = start(restored, ScriptedSdk::new());
    let mut auth = h.session.subscribe_auth();
    let mut seen = vec![*auth.borrow_and_update()];

    // Connection status catches up well after the grace delay.
    let hub = h.hub.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(400)).await;
        hub.update(|s| {
            s.connected = true;
            s.address = Some(SCRIPTED_ADDRESS.into());
        });
    });

    let watch_until = tokio::time::Instant::now() + Duration::from_secs(1);
    while let Ok(Ok(())) = tokio::time::timeout_at(watch_until, auth.changed()).await {
        seen.push(*auth.borrow_and_update());
    }

    assert_eq!(seen, vec![AuthState::Initializing, AuthState::Authenticated]);
    assert_eq!(welcome_count(&drain(&mut h.notices)), 0);
    assert_eq!(h.sdk.count(SdkOp::SwitchChain), 0);
}

#[tokio::test(start_paused = true)]
async fn funding_requires_a_provider_handle() {
    let mut h = start(SessionSignal::default(), ScriptedSdk::new());

    assert_eq!(h.session.trigger_funding().await, Err(FundingError::NotConnected));
    assert!(h.sdk.calls().is_empty());

    h.hub.update(|s| s.provider = Some(SessionHandle::new("live")));
    assert_eq!(h.session.trigger_funding().await, Ok(FundingOutcome::CheckoutOpened));
    assert_eq!(h.sdk.count(SdkOp::Checkout), 1);

    let events = drain(&mut h.notices);
    assert!(events.contains(&UiEvent::Dismiss { id: FUNDING_NOTICE_ID.into() }));
}

#[tokio::test(start_paused = true)]
async fn failed_connect_surfaces_inline() {
    let h = start(SessionSignal::default(), ScriptedSdk::new().failing(SdkOp::Connect));
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(h.session.connect().await.is_err());
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(h.session.auth_state(), AuthState::Unauthenticated);
    let View::SignIn { connecting, connect_error } = h.session.view() else {
        panic!("expected sign-in view");
    };
    assert!(!connecting);
    assert!(connect_error.is_some());
}

#[tokio::test(start_paused = true)]
async fn disconnect_returns_to_sign_in() {
    let h = start(SessionSignal::default(), ScriptedSdk::new());
    h.session.connect().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.session.auth_state(), AuthState::Authenticated);

    h.session.disconnect().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.session.auth_state(), AuthState::Unauthenticated);
    assert_eq!(h.sdk.calls().last(), Some(&SdkCall::Disconnect));
}

#[tokio::test(start_paused = true)]
async fn dropping_the_session_stops_its_tasks() {
    let h = start(SessionSignal::default(), ScriptedSdk::new());
    let mut auth = h.session.subscribe_auth();
    tokio::time::sleep(Duration::from_millis(10)).await;
    let _ = auth.borrow_and_update();

    drop(h.session);
    let closed = tokio::time::timeout(Duration::from_secs(1), auth.changed()).await;
    assert!(matches!(closed, Ok(Err(_))), "auth channel should close once the reconciler is aborted");
}
