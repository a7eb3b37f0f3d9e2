//! Which screen to render for the current session.
//!
//! Pure projection of `(AuthState, SessionSignal, profile)`. The gate is the
//! auth state alone; the signal and profile only fill in display fields.

use serde::Serialize;

use crate::reconciler::AuthState;
use crate::signal::{SessionSignal, UserProfile};

pub const DEFAULT_DISPLAY_NAME: &str = "User";
pub const DEFAULT_EMAIL: &str = "user@example.com";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum View {
    /// Session restoration has not settled yet.
    Loading,
    SignIn {
        connecting: bool,
        connect_error: Option<String>,
    },
    Dashboard {
        address: Option<String>,
        name: String,
        email: String,
        avatar: Option<String>,
        disconnecting: bool,
        disconnect_error: Option<String>,
    },
}

impl View {
    #[must_use]
    pub fn from_parts(auth: AuthState, signal: &SessionSignal, profile: Option<&UserProfile>) -> Self {
        match auth {
            AuthState::Initializing => Self::Loading,
            AuthState::Unauthenticated => Self::SignIn {
                connecting: signal.connecting,
                connect_error: signal.connect_error.clone(),
            },
            AuthState::Authenticated => Self::Dashboard {
                address: signal.address.as_deref().map(truncate_address),
                name: profile
                    .and_then(|p| p.name.clone())
                    .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()),
                email: profile
                    .and_then(|p| p.email.clone())
                    .unwrap_or_else(|| DEFAULT_EMAIL.to_string()),
                avatar: profile.and_then(|p| p.profile_image.clone()),
                disconnecting: signal.disconnecting,
                disconnect_error: signal.disconnect_error.clone(),
            },
        }
    }
}

/// `0x1234567890abcdef...` → `0x1234...cdef`. Short values pass through.
#[must_use]
pub fn truncate_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
#[path = "view_test.rs"]
mod tests;
