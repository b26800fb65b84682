use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use centavo_billpay::{BillPayment, BillPaymentState, BillPaymentStore};
use centavo_core::{LedgerError, LedgerResult, PaymentId};
use centavo_gateway::PendingRef;

/// In-memory bill payment records, with the secondary indexes the webhook
/// path and the reconciler rely on.
#[derive(Debug, Default)]
pub struct InMemoryBillPaymentStore {
    by_id: RwLock<HashMap<PaymentId, BillPayment>>,
    by_reference: RwLock<HashMap<String, PaymentId>>,
    by_pending_ref: RwLock<HashMap<PendingRef, PaymentId>>,
}

impl InMemoryBillPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> LedgerError {
        LedgerError::internal("bill payment store lock poisoned")
    }
}

impl BillPaymentStore for InMemoryBillPaymentStore {
    fn save(&self, payment: &BillPayment) -> LedgerResult<()> {
        let mut by_id = self.by_id.write().map_err(|_| Self::poisoned())?;
        let mut by_reference = self.by_reference.write().map_err(|_| Self::poisoned())?;

        if let Some(existing) = by_reference.get(&payment.reference)
            && *existing != payment.payment_id
        {
            return Err(LedgerError::conflict(format!(
                "reference {} already belongs to another payment",
                payment.reference
            )));
        }

        by_reference.insert(payment.reference.clone(), payment.payment_id);
        if let Some(pending_ref) = &payment.pending_ref {
            self.by_pending_ref
                .write()
                .map_err(|_| Self::poisoned())?
                .insert(pending_ref.clone(), payment.payment_id);
        }
        by_id.insert(payment.payment_id, payment.clone());
        Ok(())
    }

    fn get(&self, payment_id: PaymentId) -> LedgerResult<Option<BillPayment>> {
        let by_id = self.by_id.read().map_err(|_| Self::poisoned())?;
        Ok(by_id.get(&payment_id).cloned())
    }

    fn find_by_reference(&self, reference: &str) -> LedgerResult<Option<BillPayment>> {
        let by_reference = self.by_reference.read().map_err(|_| Self::poisoned())?;
        let Some(id) = by_reference.get(reference) else {
            return Ok(None);
        };
        let by_id = self.by_id.read().map_err(|_| Self::poisoned())?;
        Ok(by_id.get(id).cloned())
    }

    fn find_by_pending_ref(&self, pending_ref: &PendingRef) -> LedgerResult<Option<BillPayment>> {
        let by_pending_ref = self.by_pending_ref.read().map_err(|_| Self::poisoned())?;
        let Some(id) = by_pending_ref.get(pending_ref) else {
            return Ok(None);
        };
        let by_id = self.by_id.read().map_err(|_| Self::poisoned())?;
        Ok(by_id.get(id).cloned())
    }

    fn unresolved(&self, cutoff: DateTime<Utc>) -> LedgerResult<Vec<BillPayment>> {
        let by_id = self.by_id.read().map_err(|_| Self::poisoned())?;
        let mut unresolved: Vec<BillPayment> = by_id
            .values()
            .filter(|p| {
                let eligible = match p.state {
                    BillPaymentState::Settling => true,
                    // A failed payment without a debit never moved money.
                    BillPaymentState::Failed => p.debit_entry_id.is_some(),
                    _ => false,
                };
                eligible && p.updated_at <= cutoff
            })
            .cloned()
            .collect();
        unresolved.sort_by_key(|p| p.updated_at);
        Ok(unresolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use centavo_core::{AccountId, ProviderId};
    use std::str::FromStr;

    fn payment(reference: &str) -> BillPayment {
        BillPayment::new(
            AccountId::new(),
            ProviderId::from_str("dstv").unwrap(),
            "1234567890".to_string(),
            2_500_00,
            25_00,
            reference.to_string(),
        )
    }

    #[test]
    fn pending_ref_index_tracks_saved_payments() {
        let store = InMemoryBillPaymentStore::new();
        let mut p = payment("B-1");
        p.transition(BillPaymentState::Debited).unwrap();
        p.pending_ref = Some(PendingRef::new("GW-9"));
        p.transition(BillPaymentState::Settling).unwrap();
        store.save(&p).unwrap();

        let found = store
            .find_by_pending_ref(&PendingRef::new("GW-9"))
            .unwrap()
            .unwrap();
        assert_eq!(found.payment_id, p.payment_id);
    }

    #[test]
    fn unresolved_query_returns_only_old_settling_payments() {
        let store = InMemoryBillPaymentStore::new();

        let mut settling = payment("B-1");
        settling.transition(BillPaymentState::Debited).unwrap();
        settling.transition(BillPaymentState::Settling).unwrap();
        store.save(&settling).unwrap();

        let fresh = payment("B-2");
        store.save(&fresh).unwrap();

        // Cutoff in the future: the settling payment qualifies as stuck.
        let stuck = store
            .unresolved(Utc::now() + chrono::Duration::seconds(5))
            .unwrap();
        assert_eq!(stuck.len(), 1);
        assert_eq!(stuck[0].payment_id, settling.payment_id);

        // Cutoff in the past: nothing is old enough.
        let stuck = store
            .unresolved(Utc::now() - chrono::Duration::seconds(60))
            .unwrap();
        assert!(stuck.is_empty());
    }

    #[test]
    fn unresolved_query_includes_failed_payments_holding_a_debit() {
        let store = InMemoryBillPaymentStore::new();

        // Failed after the debit landed: the reversal is still owed.
        let mut owed = payment("B-1");
        owed.transition(BillPaymentState::Debited).unwrap();
        owed.debit_entry_id = Some(centavo_core::EntryId::new());
        owed.transition(BillPaymentState::Failed).unwrap();
        store.save(&owed).unwrap();

        // Failed before any debit: nothing to reverse.
        let mut clean = payment("B-2");
        clean.transition(BillPaymentState::Failed).unwrap();
        store.save(&clean).unwrap();

        let unresolved = store
            .unresolved(Utc::now() + chrono::Duration::seconds(5))
            .unwrap();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].payment_id, owed.payment_id);
    }
}
