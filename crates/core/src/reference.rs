//! Transaction reference generation.
//!
//! A reference is the idempotency key of a logical operation: short,
//! human-readable, unique. Callers may supply their own; when they don't,
//! the processors mint one here.

use chrono::Utc;
use uuid::Uuid;

/// Produces unique, human-readable transaction references.
///
/// Format: `{PREFIX}-{YYYYMMDD}-{12 hex chars}`, e.g.
/// `TRF-20260825-018f3a2c9b41`. The hex tail is taken from a UUIDv7, so
/// references are time-ordered and collision-free without shared state.
#[derive(Debug, Clone)]
pub struct ReferenceGenerator {
    prefix: &'static str,
}

impl ReferenceGenerator {
    pub fn new(prefix: &'static str) -> Self {
        Self { prefix }
    }

    pub fn generate(&self) -> String {
        let uuid = Uuid::now_v7();
        let bytes = uuid.as_bytes();
        // Last 6 bytes of a v7 uuid are random; the timestamp half is
        // already carried by the date segment.
        let tail: String = bytes[10..16].iter().map(|b| format!("{b:02x}")).collect();
        format!("{}-{}-{}", self.prefix, Utc::now().format("%Y%m%d"), tail)
    }
}

/// Validate a caller-supplied reference.
///
/// References travel through external systems (webhooks, statements), so
/// the accepted alphabet is deliberately narrow.
pub fn validate_reference(reference: &str) -> Result<(), crate::LedgerError> {
    if reference.is_empty() || reference.len() > 64 {
        return Err(crate::LedgerError::invalid_argument(
            "reference must be 1..=64 characters",
        ));
    }
    if !reference
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return Err(crate::LedgerError::invalid_argument(
            "reference contains invalid characters",
        ));
    }
    Ok(())
}
