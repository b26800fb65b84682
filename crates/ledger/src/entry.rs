use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use centavo_core::{AccountId, EntryId};

/// Classification of a ledger posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Trade,
    TransferIn,
    TransferOut,
    BillPayment,
    Deposit,
    Fee,
    Reversal,
}

/// One immutable posting against an account.
///
/// Amounts are signed minor units: negative = debit, positive = credit.
/// Entries are never mutated or deleted; corrections are new `Reversal`
/// entries pointing back via `reversal_of`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: EntryId,
    pub account_id: AccountId,
    pub amount: i64,
    /// Available balance immediately after this entry was applied.
    pub balance_after: i64,
    /// Idempotency key of the logical operation, unique per account.
    pub reference: String,
    pub kind: EntryKind,
    /// Set on reversal entries: the entry being undone.
    pub reversal_of: Option<EntryId>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn is_debit(&self) -> bool {
        self.amount < 0
    }

    pub fn is_credit(&self) -> bool {
        self.amount > 0
    }
}
