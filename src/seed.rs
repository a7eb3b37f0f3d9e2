//! Cookie-derived initial state.
//!
//! SYSTEM CONTEXT
//! ==============
//! The server forwards the raw `Cookie` header once at startup. The SDK keeps
//! its session in a single cookie holding percent-encoded JSON; the only
//! parts the session core needs are the session id (to seed the provider
//! handle before the first snapshot) and the last known chain.
//!
//! ERROR HANDLING
//! ==============
//! A missing cookie means "nothing to restore". A malformed cookie is logged
//! and also treated as nothing to restore; the user can always sign in again.

use cookie::Cookie;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ErrorCode;
use crate::signal::SessionHandle;

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("session cookie is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ErrorCode for SeedError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Json(_) => "E_SEED_JSON",
        }
    }
}

/// State restored from the server-provided cookie.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialState {
    pub provider: Option<SessionHandle>,
    pub chain_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CookieBlob {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    chain_id: Option<ChainIdRepr>,
}

/// The SDK writes chain ids either as numbers or as `0x` hex strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChainIdRepr {
    Number(u64),
    Text(String),
}

impl ChainIdRepr {
    fn value(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => match s.strip_prefix("0x") {
                Some(hex) => u64::from_str_radix(hex, 16).ok(),
                None => s.parse().ok(),
            },
        }
    }
}

impl InitialState {
    /// Decode the seed from a raw `Cookie` header, logging malformed cookies.
    #[must_use]
    pub fn from_cookie_header(header: Option<&str>, cookie_name: &str) -> Self {
        match Self::try_from_cookie_header(header, cookie_name) {
            Ok(state) => state,
            Err(e) => {
                warn!(code = e.error_code(), error = %e, cookie = cookie_name, "ignoring malformed session cookie");
                Self::default()
            }
        }
    }

    /// Decode the seed from a raw `Cookie` header.
    ///
    /// # Errors
    ///
    /// Returns an error if the named cookie exists but is not valid JSON.
    /// A cookie whose value is not valid percent-encoding is skipped like
    /// any other unparseable pair.
    pub fn try_from_cookie_header(header: Option<&str>, cookie_name: &str) -> Result<Self, SeedError> {
        let Some(raw) = header.and_then(|h| find_cookie(h, cookie_name)) else {
            return Ok(Self::default());
        };
        if raw.is_empty() {
            return Ok(Self::default());
        }

        let blob: CookieBlob = serde_json::from_str(&raw)?;

        let provider = blob
            .session_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .map(SessionHandle::new);
        let chain_id = blob.chain_id.as_ref().and_then(ChainIdRepr::value);

        Ok(Self { provider, chain_id })
    }
}

/// Decoded value of the first cookie called `name`. Browsers send the
/// most specific path first, so the first match wins.
fn find_cookie(header: &str, name: &str) -> Option<String> {
    Cookie::split_parse_encoded(header)
        .filter_map(|parsed| {
            parsed
                .inspect_err(|e| debug!(error = %e, "skipping unparseable cookie pair"))
                .ok()
        })
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value_trimmed().to_string())
}

#[cfg(test)]
#[path = "seed_test.rs"]
mod tests;
