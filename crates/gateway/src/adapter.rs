use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use centavo_core::LedgerResult;

/// The rail's own identifier for an in-flight settlement, used for later
/// verification and webhook correlation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingRef(pub String);

impl PendingRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for PendingRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Settlement outcome as reported by the rail.
///
/// `Pending` is a real answer, not an error: the rail has accepted the
/// request and will confirm asynchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    Success,
    Failed,
    Pending,
}

/// Contract with the external mobile-money gateway.
///
/// Calls over this boundary are the only operations in the core expected
/// to block for non-trivial time; callers wrap them in explicit timeouts.
/// A timeout is ambiguity, never failure.
#[async_trait]
pub trait GatewaySettlementAdapter: Send + Sync {
    /// Ask the rail to move `amount` to the biller identified by `channel`.
    async fn initiate(
        &self,
        reference: &str,
        amount: i64,
        channel: &str,
    ) -> LedgerResult<PendingRef>;

    /// Query the rail for the current status of an in-flight settlement.
    async fn verify(&self, pending_ref: &PendingRef) -> LedgerResult<SettlementStatus>;
}

#[async_trait]
impl<G> GatewaySettlementAdapter for Arc<G>
where
    G: GatewaySettlementAdapter + ?Sized,
{
    async fn initiate(
        &self,
        reference: &str,
        amount: i64,
        channel: &str,
    ) -> LedgerResult<PendingRef> {
        (**self).initiate(reference, amount, channel).await
    }

    async fn verify(&self, pending_ref: &PendingRef) -> LedgerResult<SettlementStatus> {
        (**self).verify(pending_ref).await
    }
}
