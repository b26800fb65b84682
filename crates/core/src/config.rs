//! Policy configuration.
//!
//! Fees, limits, retry budgets and gateway tuning are injected as
//! configuration; the processors never embed these as literals.

use serde::Deserialize;
use std::time::Duration;

/// Fee schedule for transfers and bill payments.
///
/// `fee_for` is a pure function of the amount: flat component plus basis
/// points, optionally capped.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FeePolicy {
    /// Flat component in minor units.
    pub flat: i64,
    /// Proportional component in basis points (1/100 of a percent).
    pub bps: u32,
    /// Upper bound on the total fee, in minor units.
    pub cap: Option<i64>,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            flat: 0,
            bps: 50, // 0.5%
            cap: Some(50_00),
        }
    }
}

impl FeePolicy {
    /// Zero-fee policy (useful in tests and for fee-exempt channels).
    pub fn free() -> Self {
        Self {
            flat: 0,
            bps: 0,
            cap: None,
        }
    }

    pub fn fee_for(&self, amount: i64) -> i64 {
        let proportional = (amount as i128 * self.bps as i128 / 10_000) as i64;
        let fee = self.flat + proportional;
        match self.cap {
            Some(cap) => fee.min(cap),
            None => fee,
        }
    }
}

/// Per-transaction and per-period ceilings for outbound money movement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Largest single outbound amount, in minor units.
    pub per_transaction_max: i64,
    /// Largest total outbound per account per rolling day, in minor units.
    pub per_day_max: i64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            per_transaction_max: 500_000_00,
            per_day_max: 2_000_000_00,
        }
    }
}

/// Bounded retry for optimistic-concurrency conflicts on ledger postings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Linear backoff step between attempts, in milliseconds.
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_ms: 2,
        }
    }
}

impl RetryPolicy {
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(attempt as u64))
    }
}

/// External settlement rail tuning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Explicit timeout on `initiate`/`verify` calls, in milliseconds.
    /// A timeout moves the payment to `settling`; it never implies failure.
    pub call_timeout_ms: u64,
    /// Age after which a `settling` payment becomes eligible for `verify`.
    pub stuck_after_secs: i64,
    /// Age after which a still-ambiguous payment is compensated and failed.
    pub give_up_after_secs: i64,
    /// Shared secret for webhook HMAC-SHA256 signatures.
    pub webhook_secret: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: 10_000,
            stuck_after_secs: 60,
            give_up_after_secs: 24 * 60 * 60,
            webhook_secret: String::new(),
        }
    }
}

impl GatewayConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}
