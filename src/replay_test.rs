use super::*;
use crate::notice::NoticeKind;

fn states(report: &ReplayReport) -> Vec<AuthState> {
    report.transitions.iter().map(|t| t.state).collect()
}

fn welcome_count(report: &ReplayReport) -> usize {
    report
        .notices
        .iter()
        .filter(|e| matches!(e, UiEvent::Show(n) if n.kind == NoticeKind::Welcome))
        .count()
}

#[test]
fn patch_distinguishes_absent_from_null() {
    let patch: SignalPatch = serde_json::from_str(r#"{ "address": null, "chainId": 5 }"#).unwrap();
    let mut signal = SessionSignal {
        address: Some("0xabc".into()),
        provider: Some(SessionHandle::new("keep")),
        ..SessionSignal::default()
    };
    patch.apply(&mut signal);

    assert_eq!(signal.address, None);
    assert_eq!(signal.chain_id, Some(5));
    assert_eq!(signal.provider, Some(SessionHandle::new("keep")));
}

#[test]
fn script_defaults_and_rejects_unknown_fields() {
    let script = ReplayScript::from_json("{}").unwrap();
    assert!(script.steps.is_empty());
    assert_eq!(script.tail_ms, 1_000);

    let err = ReplayScript::from_json(r#"{ "stepz": [] }"#).unwrap_err();
    assert_eq!(err.error_code(), "E_REPLAY_SCRIPT");
}

#[tokio::test(start_paused = true)]
async fn restored_session_replay() {
    let script = ReplayScript::from_json(
        r#"{
            "initial": { "provider": "restored-1", "chainId": 137 },
            "steps": [
                { "at_ms": 50, "patch": { "connected": true, "address": "0x1111111111111111111111111111111111111111" } }
            ],
            "tail_ms": 500
        }"#,
    )
    .unwrap();

    let report = run_replay(script, &SessionConfig::default()).await.unwrap();

    assert_eq!(states(&report), vec![AuthState::Initializing, AuthState::Authenticated]);
    assert!(report.transitions[1].at_ms >= 100, "settles only after the grace delay");
    assert_eq!(welcome_count(&report), 0);
    assert!(matches!(report.final_view, View::Dashboard { .. }));
}

#[tokio::test(start_paused = true)]
async fn new_login_replay_welcomes_and_switches_chain() {
    let script = ReplayScript::from_json(
        r#"{
            "initial": { "chainId": 1 },
            "steps": [
                { "at_ms": 200, "action": "connect" },
                { "at_ms": 1500, "action": "fund" }
            ],
            "profile": { "name": "Ada", "email": "ada@example.com" }
        }"#,
    )
    .unwrap();

    let report = run_replay(script, &SessionConfig::default()).await.unwrap();

    assert_eq!(
        states(&report),
        vec![AuthState::Initializing, AuthState::Unauthenticated, AuthState::Authenticated]
    );
    assert_eq!(welcome_count(&report), 1);
    assert!(report.sdk_calls.contains(&SdkCall::SwitchChain { chain_id: 137 }));
    assert_eq!(report.funding, vec![FundingOutcome::CheckoutOpened]);
}

#[tokio::test(start_paused = true)]
async fn failing_checkout_replay_uses_fallback() {
    let script = ReplayScript::from_json(
        r#"{
            "initial": { "provider": "p", "connected": true, "address": "0xabc", "chainId": 137 },
            "steps": [ { "at_ms": 300, "action": "fund" } ],
            "fail": ["checkout"],
            "tail_ms": 100
        }"#,
    )
    .unwrap();

    let report = run_replay(script, &SessionConfig::default()).await.unwrap();
    assert_eq!(report.funding, vec![FundingOutcome::FallbackOpened]);
}
