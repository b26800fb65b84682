use serde::Serialize;
use std::sync::Arc;

use crate::AccountId;

/// What just happened, for the owner's benefit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TradeExecuted,
    TransferCompleted,
    TransferReversed,
    MoneyReceived,
    BillPaymentCompleted,
    BillPaymentFailed,
    DepositReceived,
}

/// A user-facing notification emitted after an operation reaches a
/// terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub account_id: AccountId,
    pub kind: NotificationKind,
    pub reference: String,
    pub message: String,
}

impl Notification {
    pub fn new(
        account_id: AccountId,
        kind: NotificationKind,
        reference: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            account_id,
            kind,
            reference: reference.into(),
            message: message.into(),
        }
    }
}

/// Best-effort delivery boundary. Implementations swallow their own
/// failures: a dropped notification must never roll back a completed
/// money movement.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

impl<N> NotificationSink for Arc<N>
where
    N: NotificationSink + ?Sized,
{
    fn notify(&self, notification: Notification) {
        (**self).notify(notification)
    }
}
