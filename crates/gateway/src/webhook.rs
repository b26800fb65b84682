//! Signed webhook confirmations from the payment rail.
//!
//! The signature is HMAC-SHA256 over the raw request body with a shared
//! secret, sent hex-encoded in the signature header. Verification happens
//! before the body is parsed; an unsigned or mis-signed payload never
//! reaches the state machine.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use centavo_core::{LedgerError, LedgerResult};

use crate::adapter::{PendingRef, SettlementStatus};

type HmacSha256 = Hmac<Sha256>;

/// Body of a settlement confirmation callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub pending_ref: PendingRef,
    pub reference: String,
    pub status: SettlementStatus,
    pub amount: i64,
}

/// Check the hex-encoded HMAC-SHA256 signature of a raw webhook body.
/// Comparison is constant-time.
pub fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> LedgerResult<()> {
    if secret.is_empty() {
        return Err(LedgerError::internal("webhook secret is not configured"));
    }

    let expected = hex::decode(signature_hex)
        .map_err(|_| LedgerError::invalid_argument("signature is not valid hex"))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| LedgerError::internal(format!("hmac init failed: {e}")))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| LedgerError::invalid_argument("webhook signature mismatch"))
}

/// Compute the hex signature for a body. Used by tests and by the mock
/// rail; the production signer lives on the provider's side.
pub fn sign_body(secret: &str, body: &[u8]) -> LedgerResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| LedgerError::internal(format!("hmac init failed: {e}")))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Parse a verified webhook body.
pub fn parse_webhook(body: &[u8]) -> LedgerResult<WebhookPayload> {
    serde_json::from_slice(body)
        .map_err(|e| LedgerError::invalid_argument(format!("malformed webhook body: {e}")))
}
