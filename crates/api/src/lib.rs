// API crate clippy configuration
// Test code patterns:
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Litestripe Webhook Server
//!
//! The transport shell around the reconciliation core: endpoint-id gating,
//! Stripe signature verification, and the always-acknowledge webhook route.
//! The core never sees an event that failed verification.

pub mod config;
pub mod error;
pub mod routes;
pub mod signature;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use signature::SignatureVerifier;
pub use state::AppState;
