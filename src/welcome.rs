//! Welcome notice, shown at most once per page lifetime.
//!
//! The gate opens when the session is connected, the reconciler has left
//! `Initializing`, and the flag has not been set yet. Opening the gate always
//! sets the flag, whether or not a notice is shown: a restored session burns
//! the flag too, so a later reconnect in the same lifetime stays quiet.

use std::time::Duration;

use tracing::{debug, info};

use crate::notice::{Notice, NoticeKind, NoticePosition};
use crate::reconciler::{AuthState, LoginKind, Reconciler};
use crate::signal::SessionSignal;

pub const WELCOME_TITLE: &str = "Welcome to TopupGo";
pub const WELCOME_BODY: &str = "Your account is ready";

/// Page-lifetime one-shot flag. Never reset once set.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WelcomeFlag {
    shown: bool,
}

impl WelcomeFlag {
    #[must_use]
    pub fn is_shown(self) -> bool {
        self.shown
    }

    fn set(&mut self) {
        self.shown = true;
    }
}

#[derive(Debug)]
pub struct WelcomeNotifier {
    flag: WelcomeFlag,
    duration: Duration,
}

impl WelcomeNotifier {
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        Self { flag: WelcomeFlag::default(), duration }
    }

    #[must_use]
    pub fn flag(&self) -> WelcomeFlag {
        self.flag
    }

    /// Check the gate for this snapshot. Returns the notice to show, if any.
    pub fn evaluate(&mut self, signal: &SessionSignal, state: AuthState, reconciler: &mut Reconciler) -> Option<Notice> {
        if !signal.connected || state == AuthState::Initializing || self.flag.is_shown() {
            return None;
        }

        self.flag.set();

        match reconciler.take_login() {
            Some(LoginKind::New) => {
                info!("new login; showing welcome notice");
                Some(
                    Notice::new(NoticeKind::Welcome, WELCOME_TITLE, self.duration)
                        .with_body(WELCOME_BODY)
                        .with_position(NoticePosition::TopCenter),
                )
            }
            kind => {
                debug!(?kind, "restored session; welcome suppressed");
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "welcome_test.rs"]
mod tests;
