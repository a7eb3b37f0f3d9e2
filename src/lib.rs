//! # topup
//!
//! Session reconciliation and wallet readiness for the TopupGo client.
//!
//! The embedded-wallet SDK publishes several independently-updating signals
//! (restored provider handle, connection status, wallet address, chain id).
//! This crate folds them into one `AuthState`, resolves the user profile,
//! keeps the wallet on the required chain, fires the welcome notice once per
//! genuinely new login, and drives the funding/checkout flow.
//!
//! The SDK and the chain RPC are consumed through the traits in [`sdk`] and
//! [`rpc`]; everything else here is owned by the crate.

pub mod balance;
pub mod chain_guard;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod funding;
pub mod notice;
pub mod profile;
pub mod reconciler;
pub mod replay;
pub mod rpc;
pub mod scripted;
pub mod sdk;
pub mod seed;
pub mod session;
pub mod signal;
pub mod view;
pub mod welcome;
