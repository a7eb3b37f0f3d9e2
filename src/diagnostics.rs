//! Scoped log noise filter.
//!
//! DESIGN
//! ======
//! The embedded-wallet SDK logs a handful of warnings that are pure noise in
//! development (captcha complaining about localhost, host validation). The
//! filter is a `tracing-subscriber` layer that drops events whose message
//! contains one of those patterns.
//!
//! It is only ever installed as a scoped default: [`install`] returns the
//! guard, and dropping the guard restores whatever dispatcher was active
//! before. Nothing global is replaced.

use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt, registry};

/// Substrings of messages that are always dropped.
pub const BUILTIN_PATTERNS: &[&str] = &["[hCaptcha]", "hCaptcha", "localhost detected", "Please use a valid host"];

#[derive(Debug, Clone)]
pub struct NoiseFilter {
    patterns: Vec<String>,
}

impl NoiseFilter {
    /// Built-in patterns plus `extra`. Blank entries are ignored.
    #[must_use]
    pub fn new(extra: &[String]) -> Self {
        let patterns = BUILTIN_PATTERNS
            .iter()
            .map(|p| (*p).to_string())
            .chain(extra.iter().filter(|p| !p.trim().is_empty()).cloned())
            .collect();
        Self { patterns }
    }

    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    #[must_use]
    pub fn is_noise(&self, message: &str) -> bool {
        is_noise(message, &self.patterns)
    }
}

#[must_use]
pub fn is_noise(message: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| message.contains(p.as_str()))
}

impl<S: Subscriber> Layer<S> for NoiseFilter {
    fn event_enabled(&self, event: &Event<'_>, _ctx: Context<'_, S>) -> bool {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        !visitor.message.is_some_and(|m| self.is_noise(&m))
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        }
    }
}

/// Install fmt output with the noise filter as the scoped default subscriber.
///
/// Level filtering follows `RUST_LOG`, defaulting to `info`.
#[must_use = "dropping the guard uninstalls the subscriber"]
pub fn install(extra_patterns: &[String]) -> DefaultGuard {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = registry()
        .with(env)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(NoiseFilter::new(extra_patterns));
    tracing::subscriber::set_default(subscriber)
}

#[cfg(test)]
#[path = "diagnostics_test.rs"]
mod tests;
