//! Funding orchestrator: top-up via checkout, with a wallet-UI fallback.
//!
//! ARCHITECTURE
//! ============
//! Primary path opens the checkout modal restricted to one fiat currency and
//! one settlement token. Only if that fails does the fallback open the
//! wallet's funding view. The two never run concurrently.
//!
//! ERROR HANDLING
//! ==============
//! - No session: immediate "not connected" notice, no SDK call.
//! - Primary failure: one user-visible error notice.
//! - Fallback failure: logged only; the user already saw the primary error.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::FundingConfig;
use crate::error::ErrorCode;
use crate::notice::{Notice, NoticeKind, NoticeSink};
use crate::sdk::{CheckoutRequest, FundingViewRequest, WalletSdk};
use crate::signal::SessionHandle;

pub const FUNDING_NOTICE_ID: &str = "buy-crypto";
pub const OPENING_MESSAGE: &str = "Opening Buy…";
pub const OPENED_MESSAGE: &str = "Buy opened";
pub const FAILED_MESSAGE: &str = "Failed to open Buy. Please try again.";
pub const NOT_CONNECTED_MESSAGE: &str = "Wallet not connected";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FundingError {
    #[error("wallet not connected")]
    NotConnected,
}

impl ErrorCode for FundingError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotConnected => "E_NOT_CONNECTED",
        }
    }
}

/// How a funding attempt ended once it got past the precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FundingOutcome {
    CheckoutOpened,
    /// Checkout failed; the wallet funding view opened instead.
    FallbackOpened,
    /// Checkout and the fallback both failed.
    Unavailable,
}

#[derive(Clone)]
pub struct FundingOrchestrator {
    sdk: Arc<dyn WalletSdk>,
    config: FundingConfig,
    notices: NoticeSink,
}

impl FundingOrchestrator {
    #[must_use]
    pub fn new(sdk: Arc<dyn WalletSdk>, config: FundingConfig, notices: NoticeSink) -> Self {
        Self { sdk, config, notices }
    }

    #[must_use]
    pub fn checkout_request(&self) -> CheckoutRequest {
        CheckoutRequest {
            fiat_currencies: vec![self.config.fiat_currency.clone()],
            settlement_tokens: vec![self.config.settlement_token.clone()],
        }
    }

    /// Start a funding attempt for the current session.
    ///
    /// # Errors
    ///
    /// Returns [`FundingError::NotConnected`] when there is no session handle;
    /// no SDK call is made in that case.
    pub async fn trigger(&self, session: Option<&SessionHandle>) -> Result<FundingOutcome, FundingError> {
        let Some(session) = session else {
            self.notices.show(self.notice(NoticeKind::Error, NOT_CONNECTED_MESSAGE));
            return Err(FundingError::NotConnected);
        };

        let attempt = Uuid::new_v4();
        info!(%attempt, %session, "opening checkout");
        self.notices.show(self.notice(NoticeKind::Loading, OPENING_MESSAGE));

        let request = self.checkout_request();
        match self.sdk.open_checkout(&request).await {
            Ok(()) => {
                self.notices.dismiss(FUNDING_NOTICE_ID);
                self.notices.show(self.notice(NoticeKind::Success, OPENED_MESSAGE));
                Ok(FundingOutcome::CheckoutOpened)
            }
            Err(e) => {
                error!(
                    %attempt,
                    code = e.error_code(),
                    retryable = e.retryable(),
                    error = %e,
                    "checkout failed; falling back to funding view"
                );
                self.notices.dismiss(FUNDING_NOTICE_ID);
                self.notices.show(self.notice(NoticeKind::Error, FAILED_MESSAGE));
                Ok(self.fallback(attempt).await)
            }
        }
    }

    async fn fallback(&self, attempt: Uuid) -> FundingOutcome {
        let request = FundingViewRequest { path: self.config.funding_path.clone() };
        match self.sdk.open_funding_view(&request).await {
            Ok(()) => {
                info!(%attempt, path = %request.path, "funding view opened");
                FundingOutcome::FallbackOpened
            }
            Err(e) => {
                warn!(%attempt, code = e.error_code(), error = %e, "funding view fallback also failed");
                FundingOutcome::Unavailable
            }
        }
    }

    fn notice(&self, kind: NoticeKind, title: &str) -> Notice {
        Notice::new(kind, title, self.config.notice_duration).with_id(FUNDING_NOTICE_ID)
    }
}

#[cfg(test)]
#[path = "funding_test.rs"]
mod tests;
