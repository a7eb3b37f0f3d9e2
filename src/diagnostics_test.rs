use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::*;

#[test]
fn builtin_patterns_match_sdk_noise() {
    let filter = NoiseFilter::new(&[]);
    assert!(filter.is_noise("[hCaptcha] localhost detected. Please use a valid host."));
    assert!(filter.is_noise("hCaptcha has failed to initialize"));
    assert!(!filter.is_noise("auth state changed"));
}

#[test]
fn extra_patterns_extend_builtins() {
    let filter = NoiseFilter::new(&["walletconnect relay".to_string(), "  ".to_string()]);
    assert!(filter.is_noise("walletconnect relay reconnecting"));
    assert!(filter.is_noise("hCaptcha"));
    assert_eq!(filter.patterns().len(), BUILTIN_PATTERNS.len() + 1);
}

/// Counts every event that reaches the end of the stack.
struct Counter(Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for Counter {
    fn on_event(&self, _event: &Event<'_>, _ctx: Context<'_, S>) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn layer_drops_noisy_events_only() {
    let seen = Arc::new(AtomicUsize::new(0));
    let subscriber = registry().with(NoiseFilter::new(&[])).with(Counter(Arc::clone(&seen)));

    tracing::subscriber::with_default(subscriber, || {
        tracing::warn!("[hCaptcha] localhost detected");
        tracing::info!(chain_id = 137, "switching to required chain");
        tracing::warn!(target: "sdk", "Please use a valid host");
    });

    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn guard_restores_previous_dispatcher() {
    let seen = Arc::new(AtomicUsize::new(0));
    let subscriber = registry().with(NoiseFilter::new(&[])).with(Counter(Arc::clone(&seen)));

    let guard = tracing::subscriber::set_default(subscriber);
    tracing::info!("inside scope");
    drop(guard);
    tracing::info!("outside scope");

    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn install_returns_scoped_guard() {
    let guard = install(&["custom noise".to_string()]);
    tracing::info!("custom noise is dropped");
    drop(guard);
}
