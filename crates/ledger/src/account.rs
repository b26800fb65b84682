use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use centavo_core::reference::validate_reference;
use centavo_core::{
    Aggregate, AggregateRoot, AccountId, Currency, EntryId, LedgerError, OwnerId,
};
use centavo_events::Event;

use crate::entry::{EntryKind, LedgerEntry};

/// Account lifecycle status.
///
/// Frozen accounts reject new outbound postings (compliance gate); closed
/// accounts reject everything. Neither state is ever deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Frozen,
    Closed,
}

/// Aggregate root: a wallet account.
///
/// Balance, reserved balance, status and version are a fold over the
/// account's entry stream; the aggregate never holds state the stream
/// cannot reproduce. The per-reference index makes duplicate postings
/// a deterministic no-op, which is what gives `post` idempotent retries.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    id: AccountId,
    owner_id: Option<OwnerId>,
    currency: Option<Currency>,
    status: AccountStatus,
    balance: i64,
    reserved_balance: i64,
    entries: Vec<LedgerEntry>,
    by_reference: HashMap<String, usize>,
    /// Active holds keyed by reservation reference.
    reservations: HashMap<String, i64>,
    version: u64,
    created: bool,
}

impl Account {
    /// Empty aggregate for rehydration.
    pub fn empty(id: AccountId) -> Self {
        Self {
            id,
            owner_id: None,
            currency: None,
            status: AccountStatus::Active,
            balance: 0,
            reserved_balance: 0,
            entries: Vec::new(),
            by_reference: HashMap::new(),
            reservations: HashMap::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> AccountId {
        self.id
    }

    pub fn owner_id(&self) -> Option<OwnerId> {
        self.owner_id
    }

    pub fn currency(&self) -> Option<Currency> {
        self.currency
    }

    pub fn status(&self) -> AccountStatus {
        self.status
    }

    pub fn balance(&self) -> i64 {
        self.balance
    }

    pub fn reserved_balance(&self) -> i64 {
        self.reserved_balance
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Look up the entry posted under `reference`, if any.
    pub fn entry_by_reference(&self, reference: &str) -> Option<&LedgerEntry> {
        self.by_reference.get(reference).map(|&i| &self.entries[i])
    }

    pub fn entry_by_id(&self, entry_id: EntryId) -> Option<&LedgerEntry> {
        self.entries.iter().find(|e| e.entry_id == entry_id)
    }

    /// Total outbound money movement (transfer and bill-payment debits,
    /// net of reversals) posted at or after `since`, in minor units.
    /// Feeds the rolling-day ceiling check.
    pub fn outbound_since(&self, since: DateTime<Utc>) -> i64 {
        let reversed: HashSet<EntryId> = self
            .entries
            .iter()
            .filter_map(|e| e.reversal_of)
            .collect();
        self.entries
            .iter()
            .filter(|e| e.created_at >= since)
            .filter(|e| matches!(e.kind, EntryKind::TransferOut | EntryKind::BillPayment))
            .filter(|e| e.amount < 0 && !reversed.contains(&e.entry_id))
            .map(|e| -e.amount)
            .sum()
    }
}

impl AggregateRoot for Account {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: open a new account for an owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAccount {
    pub account_id: AccountId,
    pub owner_id: OwnerId,
    pub currency: Currency,
    pub occurred_at: DateTime<Utc>,
}

/// Command: post one signed entry (negative = debit, positive = credit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostEntry {
    pub entry_id: EntryId,
    pub amount: i64,
    pub kind: EntryKind,
    pub reference: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: append the equal-and-opposite entry for a prior posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseEntry {
    pub entry_id: EntryId,
    pub original_entry_id: EntryId,
    /// Derived from the original entry id, so a repeated reversal dedupes.
    pub reference: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: move available funds into the reserved bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveFunds {
    pub amount: i64,
    pub reference: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: release a hold back into the available balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseReservation {
    pub reference: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreezeAccount {
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnfreezeAccount {
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseAccount {
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountCommand {
    Open(OpenAccount),
    Post(PostEntry),
    Reverse(ReverseEntry),
    Reserve(ReserveFunds),
    Release(ReleaseReservation),
    Freeze(FreezeAccount),
    Unfreeze(UnfreezeAccount),
    Close(CloseAccount),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountEvent {
    AccountOpened {
        account_id: AccountId,
        owner_id: OwnerId,
        currency: Currency,
        occurred_at: DateTime<Utc>,
    },
    EntryPosted {
        entry: LedgerEntry,
    },
    FundsReserved {
        account_id: AccountId,
        amount: i64,
        reference: String,
        occurred_at: DateTime<Utc>,
    },
    ReservationReleased {
        account_id: AccountId,
        amount: i64,
        reference: String,
        occurred_at: DateTime<Utc>,
    },
    AccountFrozen {
        account_id: AccountId,
        reason: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    AccountUnfrozen {
        account_id: AccountId,
        occurred_at: DateTime<Utc>,
    },
    AccountClosed {
        account_id: AccountId,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for AccountEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AccountEvent::AccountOpened { .. } => "ledger.account.opened",
            AccountEvent::EntryPosted { .. } => "ledger.account.entry_posted",
            AccountEvent::FundsReserved { .. } => "ledger.account.funds_reserved",
            AccountEvent::ReservationReleased { .. } => "ledger.account.reservation_released",
            AccountEvent::AccountFrozen { .. } => "ledger.account.frozen",
            AccountEvent::AccountUnfrozen { .. } => "ledger.account.unfrozen",
            AccountEvent::AccountClosed { .. } => "ledger.account.closed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AccountEvent::AccountOpened { occurred_at, .. }
            | AccountEvent::FundsReserved { occurred_at, .. }
            | AccountEvent::ReservationReleased { occurred_at, .. }
            | AccountEvent::AccountFrozen { occurred_at, .. }
            | AccountEvent::AccountUnfrozen { occurred_at, .. }
            | AccountEvent::AccountClosed { occurred_at, .. } => *occurred_at,
            AccountEvent::EntryPosted { entry } => entry.created_at,
        }
    }
}

impl Aggregate for Account {
    type Command = AccountCommand;
    type Event = AccountEvent;
    type Error = LedgerError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AccountEvent::AccountOpened {
                account_id,
                owner_id,
                currency,
                ..
            } => {
                self.id = *account_id;
                self.owner_id = Some(*owner_id);
                self.currency = Some(*currency);
                self.status = AccountStatus::Active;
                self.created = true;
            }
            AccountEvent::EntryPosted { entry } => {
                self.balance = entry.balance_after;
                self.by_reference
                    .insert(entry.reference.clone(), self.entries.len());
                self.entries.push(entry.clone());
            }
            AccountEvent::FundsReserved {
                amount, reference, ..
            } => {
                self.balance -= amount;
                self.reserved_balance += amount;
                self.reservations.insert(reference.clone(), *amount);
            }
            AccountEvent::ReservationReleased {
                amount, reference, ..
            } => {
                self.balance += amount;
                self.reserved_balance -= amount;
                self.reservations.remove(reference);
            }
            AccountEvent::AccountFrozen { .. } => {
                self.status = AccountStatus::Frozen;
            }
            AccountEvent::AccountUnfrozen { .. } => {
                self.status = AccountStatus::Active;
            }
            AccountEvent::AccountClosed { .. } => {
                self.status = AccountStatus::Closed;
            }
        }

        // Deterministic version tracking: +1 per applied event. The stream
        // sequence number and this counter always agree.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AccountCommand::Open(cmd) => self.handle_open(cmd),
            AccountCommand::Post(cmd) => self.handle_post(cmd),
            AccountCommand::Reverse(cmd) => self.handle_reverse(cmd),
            AccountCommand::Reserve(cmd) => self.handle_reserve(cmd),
            AccountCommand::Release(cmd) => self.handle_release(cmd),
            AccountCommand::Freeze(cmd) => self.handle_freeze(cmd),
            AccountCommand::Unfreeze(cmd) => self.handle_unfreeze(cmd),
            AccountCommand::Close(cmd) => self.handle_close(cmd),
        }
    }
}

impl Account {
    fn ensure_open(&self) -> Result<(), LedgerError> {
        if !self.created {
            return Err(LedgerError::not_found());
        }
        match self.status {
            AccountStatus::Active => Ok(()),
            AccountStatus::Frozen => Err(LedgerError::AccountFrozen),
            AccountStatus::Closed => Err(LedgerError::AccountClosed),
        }
    }

    fn handle_open(&self, cmd: &OpenAccount) -> Result<Vec<AccountEvent>, LedgerError> {
        if self.created {
            return Err(LedgerError::conflict("account already exists"));
        }

        Ok(vec![AccountEvent::AccountOpened {
            account_id: cmd.account_id,
            owner_id: cmd.owner_id,
            currency: cmd.currency,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_post(&self, cmd: &PostEntry) -> Result<Vec<AccountEvent>, LedgerError> {
        self.ensure_open()?;
        validate_reference(&cmd.reference)?;

        if cmd.amount == 0 {
            return Err(LedgerError::invalid_argument("amount must be non-zero"));
        }

        // Idempotent retry: re-posting a seen reference is a no-op. The
        // caller reads the original entry back out of the state.
        if self.by_reference.contains_key(&cmd.reference) {
            return Ok(vec![]);
        }

        let balance_after = self
            .balance
            .checked_add(cmd.amount)
            .ok_or_else(|| LedgerError::internal("balance overflow"))?;

        // Debit validation commits under the same version-conditioned
        // append as the entry itself: no read-then-write window.
        if balance_after < 0 {
            return Err(LedgerError::InsufficientFunds {
                available: self.balance,
                requested: -cmd.amount,
            });
        }

        Ok(vec![AccountEvent::EntryPosted {
            entry: LedgerEntry {
                entry_id: cmd.entry_id,
                account_id: self.id,
                amount: cmd.amount,
                balance_after,
                reference: cmd.reference.clone(),
                kind: cmd.kind,
                reversal_of: None,
                created_at: cmd.occurred_at,
            },
        }])
    }

    fn handle_reverse(&self, cmd: &ReverseEntry) -> Result<Vec<AccountEvent>, LedgerError> {
        if !self.created {
            return Err(LedgerError::not_found());
        }
        // Compensation must be able to restore a frozen account; only a
        // closed account rejects reversals.
        if self.status == AccountStatus::Closed {
            return Err(LedgerError::AccountClosed);
        }

        // Reversing twice is a no-op (compensate exactly once).
        if self.by_reference.contains_key(&cmd.reference) {
            return Ok(vec![]);
        }

        let original = self
            .entry_by_id(cmd.original_entry_id)
            .ok_or(LedgerError::NotFound)?;

        let amount = -original.amount;
        let balance_after = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::internal("balance overflow"))?;

        if balance_after < 0 {
            return Err(LedgerError::InsufficientFunds {
                available: self.balance,
                requested: -amount,
            });
        }

        Ok(vec![AccountEvent::EntryPosted {
            entry: LedgerEntry {
                entry_id: cmd.entry_id,
                account_id: self.id,
                amount,
                balance_after,
                reference: cmd.reference.clone(),
                kind: EntryKind::Reversal,
                reversal_of: Some(original.entry_id),
                created_at: cmd.occurred_at,
            },
        }])
    }

    fn handle_reserve(&self, cmd: &ReserveFunds) -> Result<Vec<AccountEvent>, LedgerError> {
        self.ensure_open()?;
        validate_reference(&cmd.reference)?;

        if cmd.amount <= 0 {
            return Err(LedgerError::invalid_argument(
                "reservation amount must be positive",
            ));
        }
        if self.reservations.contains_key(&cmd.reference) {
            return Ok(vec![]);
        }
        if self.balance < cmd.amount {
            return Err(LedgerError::InsufficientFunds {
                available: self.balance,
                requested: cmd.amount,
            });
        }

        Ok(vec![AccountEvent::FundsReserved {
            account_id: self.id,
            amount: cmd.amount,
            reference: cmd.reference.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_release(&self, cmd: &ReleaseReservation) -> Result<Vec<AccountEvent>, LedgerError> {
        if !self.created {
            return Err(LedgerError::not_found());
        }

        let amount = match self.reservations.get(&cmd.reference) {
            Some(amount) => *amount,
            None => return Err(LedgerError::NotFound),
        };

        Ok(vec![AccountEvent::ReservationReleased {
            account_id: self.id,
            amount,
            reference: cmd.reference.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_freeze(&self, cmd: &FreezeAccount) -> Result<Vec<AccountEvent>, LedgerError> {
        if !self.created {
            return Err(LedgerError::not_found());
        }
        match self.status {
            AccountStatus::Closed => Err(LedgerError::AccountClosed),
            // Repeated freeze signals from the compliance gate are expected.
            AccountStatus::Frozen => Ok(vec![]),
            AccountStatus::Active => Ok(vec![AccountEvent::AccountFrozen {
                account_id: self.id,
                reason: cmd.reason.clone(),
                occurred_at: cmd.occurred_at,
            }]),
        }
    }

    fn handle_unfreeze(&self, cmd: &UnfreezeAccount) -> Result<Vec<AccountEvent>, LedgerError> {
        if !self.created {
            return Err(LedgerError::not_found());
        }
        match self.status {
            AccountStatus::Closed => Err(LedgerError::AccountClosed),
            AccountStatus::Active => Ok(vec![]),
            AccountStatus::Frozen => Ok(vec![AccountEvent::AccountUnfrozen {
                account_id: self.id,
                occurred_at: cmd.occurred_at,
            }]),
        }
    }

    fn handle_close(&self, cmd: &CloseAccount) -> Result<Vec<AccountEvent>, LedgerError> {
        if !self.created {
            return Err(LedgerError::not_found());
        }
        if self.status == AccountStatus::Closed {
            return Ok(vec![]);
        }
        if self.balance != 0 || self.reserved_balance != 0 {
            return Err(LedgerError::invalid_argument(
                "cannot close an account with a non-zero balance",
            ));
        }

        Ok(vec![AccountEvent::AccountClosed {
            account_id: self.id,
            occurred_at: cmd.occurred_at,
        }])
    }
}
