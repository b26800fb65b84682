//! `centavo-gateway` — the boundary to external payment rails.
//!
//! The core only depends on the narrow adapter contract here: initiate a
//! settlement, verify its status, and accept signed webhook confirmations.
//! Webhook bodies are authenticated with HMAC-SHA256 before anything in
//! the payload is trusted.

pub mod adapter;
pub mod webhook;

pub use adapter::{GatewaySettlementAdapter, PendingRef, SettlementStatus};
pub use webhook::{WebhookPayload, parse_webhook, sign_body, verify_signature};
