use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use centavo_core::{AccountId, EntryId, LedgerError, LedgerResult, TransferId};

/// Transfer lifecycle.
///
/// Happy path `Pending → Debited → Completed`; compensation path
/// `Pending → Debited → Reversed`. `Failed` is reached only before the
/// debit lands. Terminal records are immutable audit data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferState {
    Pending,
    Debited,
    Completed,
    Failed,
    Reversed,
}

impl TransferState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Reversed)
    }

    fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Debited)
                | (Self::Pending, Self::Failed)
                | (Self::Debited, Self::Completed)
                | (Self::Debited, Self::Reversed)
        )
    }
}

/// A two-sided money movement between wallets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub transfer_id: TransferId,
    pub sender_account_id: AccountId,
    pub recipient_account_id: AccountId,
    /// Amount credited to the recipient, minor units.
    pub amount: i64,
    /// Fee charged to the sender on top of `amount`.
    pub fee: i64,
    pub reference: String,
    pub state: TransferState,
    pub debit_entry_id: Option<EntryId>,
    pub credit_entry_id: Option<EntryId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transfer {
    pub fn new(
        sender_account_id: AccountId,
        recipient_account_id: AccountId,
        amount: i64,
        fee: i64,
        reference: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            transfer_id: TransferId::new(),
            sender_account_id,
            recipient_account_id,
            amount,
            fee,
            reference,
            state: TransferState::Pending,
            debit_entry_id: None,
            credit_entry_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Guarded state transition; an illegal edge is a logic error.
    pub fn transition(&mut self, next: TransferState) -> LedgerResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(LedgerError::internal(format!(
                "illegal transfer transition {:?} -> {next:?}",
                self.state
            )));
        }
        self.state = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Persistence for transfer records, indexed by id and by reference for
/// idempotent lookup.
pub trait TransferStore: Send + Sync {
    fn save(&self, transfer: &Transfer) -> LedgerResult<()>;

    fn get(&self, transfer_id: TransferId) -> LedgerResult<Option<Transfer>>;

    fn find_by_reference(&self, reference: &str) -> LedgerResult<Option<Transfer>>;
}

impl<T> TransferStore for Arc<T>
where
    T: TransferStore + ?Sized,
{
    fn save(&self, transfer: &Transfer) -> LedgerResult<()> {
        (**self).save(transfer)
    }

    fn get(&self, transfer_id: TransferId) -> LedgerResult<Option<Transfer>> {
        (**self).get(transfer_id)
    }

    fn find_by_reference(&self, reference: &str) -> LedgerResult<Option<Transfer>> {
        (**self).find_by_reference(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer() -> Transfer {
        Transfer::new(AccountId::new(), AccountId::new(), 10_000, 50, "TRF-1".into())
    }

    #[test]
    fn happy_path_transitions() {
        let mut t = transfer();
        t.transition(TransferState::Debited).unwrap();
        t.transition(TransferState::Completed).unwrap();
        assert!(t.state.is_terminal());
    }

    #[test]
    fn compensation_path_transitions() {
        let mut t = transfer();
        t.transition(TransferState::Debited).unwrap();
        t.transition(TransferState::Reversed).unwrap();
        assert!(t.state.is_terminal());
    }

    #[test]
    fn terminal_states_reject_further_transitions() {
        let mut t = transfer();
        t.transition(TransferState::Debited).unwrap();
        t.transition(TransferState::Completed).unwrap();

        for next in [
            TransferState::Pending,
            TransferState::Debited,
            TransferState::Reversed,
            TransferState::Failed,
        ] {
            assert!(t.transition(next).is_err());
        }
    }

    #[test]
    fn cannot_complete_without_debiting() {
        let mut t = transfer();
        assert!(t.transition(TransferState::Completed).is_err());
        assert!(t.transition(TransferState::Reversed).is_err());
    }
}
