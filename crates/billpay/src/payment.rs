use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use centavo_core::{AccountId, EntryId, LedgerError, LedgerResult, PaymentId, ProviderId};
use centavo_gateway::PendingRef;

/// Bill payment lifecycle.
///
/// `Settling` means the rail has (or may have) the money and has not yet
/// confirmed; the debit stands until a definitive answer arrives. `Failed`
/// records a confirmed failure and is followed by `Compensated` once the
/// debit reversal lands; a payment that failed before any debit stops at
/// `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillPaymentState {
    Pending,
    Debited,
    Settling,
    Completed,
    Failed,
    Compensated,
}

impl BillPaymentState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Compensated)
    }

    fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Debited)
                | (Self::Pending, Self::Failed)
                | (Self::Debited, Self::Settling)
                | (Self::Debited, Self::Failed)
                | (Self::Settling, Self::Completed)
                | (Self::Settling, Self::Failed)
                | (Self::Failed, Self::Compensated)
        )
    }
}

/// One-sided money movement to an external biller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillPayment {
    pub payment_id: PaymentId,
    pub account_id: AccountId,
    pub provider_id: ProviderId,
    /// Customer's account number at the biller.
    pub account_number: String,
    pub amount: i64,
    pub fee: i64,
    pub reference: String,
    pub state: BillPaymentState,
    pub debit_entry_id: Option<EntryId>,
    pub pending_ref: Option<PendingRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BillPayment {
    pub fn new(
        account_id: AccountId,
        provider_id: ProviderId,
        account_number: String,
        amount: i64,
        fee: i64,
        reference: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            payment_id: PaymentId::new(),
            account_id,
            provider_id,
            account_number,
            amount,
            fee,
            reference,
            state: BillPaymentState::Pending,
            debit_entry_id: None,
            pending_ref: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transition(&mut self, next: BillPaymentState) -> LedgerResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(LedgerError::internal(format!(
                "illegal bill payment transition {:?} -> {next:?}",
                self.state
            )));
        }
        self.state = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Persistence for bill payments, with the lookups the webhook path and
/// the reconciler need.
pub trait BillPaymentStore: Send + Sync {
    fn save(&self, payment: &BillPayment) -> LedgerResult<()>;

    fn get(&self, payment_id: PaymentId) -> LedgerResult<Option<BillPayment>>;

    fn find_by_reference(&self, reference: &str) -> LedgerResult<Option<BillPayment>>;

    fn find_by_pending_ref(&self, pending_ref: &PendingRef) -> LedgerResult<Option<BillPayment>>;

    /// Payments the reconciler must revisit, oldest first: `Settling`
    /// records whose last update is older than `cutoff`, and `Failed`
    /// records still holding their debit (an earlier compensation did not
    /// land).
    fn unresolved(&self, cutoff: DateTime<Utc>) -> LedgerResult<Vec<BillPayment>>;
}

impl<P> BillPaymentStore for Arc<P>
where
    P: BillPaymentStore + ?Sized,
{
    fn save(&self, payment: &BillPayment) -> LedgerResult<()> {
        (**self).save(payment)
    }

    fn get(&self, payment_id: PaymentId) -> LedgerResult<Option<BillPayment>> {
        (**self).get(payment_id)
    }

    fn find_by_reference(&self, reference: &str) -> LedgerResult<Option<BillPayment>> {
        (**self).find_by_reference(reference)
    }

    fn find_by_pending_ref(&self, pending_ref: &PendingRef) -> LedgerResult<Option<BillPayment>> {
        (**self).find_by_pending_ref(pending_ref)
    }

    fn unresolved(&self, cutoff: DateTime<Utc>) -> LedgerResult<Vec<BillPayment>> {
        (**self).unresolved(cutoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn payment() -> BillPayment {
        BillPayment::new(
            AccountId::new(),
            ProviderId::from_str("ikeja-electric").unwrap(),
            "0412345678".to_string(),
            5_000_00,
            50_00,
            "BIL-1".to_string(),
        )
    }

    #[test]
    fn settlement_happy_path() {
        let mut p = payment();
        p.transition(BillPaymentState::Debited).unwrap();
        p.transition(BillPaymentState::Settling).unwrap();
        p.transition(BillPaymentState::Completed).unwrap();
        assert!(p.state.is_terminal());
    }

    #[test]
    fn confirmed_failure_path_ends_compensated() {
        let mut p = payment();
        p.transition(BillPaymentState::Debited).unwrap();
        p.transition(BillPaymentState::Settling).unwrap();
        p.transition(BillPaymentState::Failed).unwrap();
        assert!(!p.state.is_terminal());
        p.transition(BillPaymentState::Compensated).unwrap();
        assert!(p.state.is_terminal());
    }

    #[test]
    fn completed_payment_cannot_fail_afterwards() {
        let mut p = payment();
        p.transition(BillPaymentState::Debited).unwrap();
        p.transition(BillPaymentState::Settling).unwrap();
        p.transition(BillPaymentState::Completed).unwrap();
        assert!(p.transition(BillPaymentState::Failed).is_err());
    }

    #[test]
    fn cannot_settle_before_debiting() {
        let mut p = payment();
        assert!(p.transition(BillPaymentState::Settling).is_err());
        assert!(p.transition(BillPaymentState::Completed).is_err());
    }
}
