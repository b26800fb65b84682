//! Command pipeline for the account aggregate.
//!
//! `LedgerStore` owns the load → rehydrate → handle → append → publish
//! cycle. Appends are conditioned on the exact stream version observed at
//! rehydration; a lost race surfaces as a store-level concurrency error and
//! is retried with fresh state, bounded by [`RetryPolicy`]. Domain
//! rejections (insufficient funds, frozen account) are never retried.

use serde_json::Value as JsonValue;
use tracing::{debug, warn};
use uuid::Uuid;

use centavo_core::{
    AccountId, Aggregate, AggregateRoot, Currency, EntryId, ExpectedVersion, LedgerError,
    LedgerResult, OwnerId, RetryPolicy,
};
use centavo_events::{
    EventBus, EventEnvelope, EventStore, EventStoreError, StoredEvent, UncommittedEvent,
};

use crate::account::{
    Account, AccountCommand, AccountEvent, AccountStatus, CloseAccount, FreezeAccount,
    OpenAccount, PostEntry, ReleaseReservation, ReserveFunds, ReverseEntry, UnfreezeAccount,
};
use crate::entry::{EntryKind, LedgerEntry};

const AGGREGATE_TYPE: &str = "account";

/// Reference under which the reversal of `entry_id` posts. Deriving it from
/// the original entry id makes "compensate exactly once" fall out of the
/// ledger's duplicate-reference rule.
pub fn reversal_reference(entry_id: EntryId) -> String {
    format!("RV-{entry_id}")
}

/// Read-model snapshot of one account, taken from the rehydrated aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceView {
    pub account_id: AccountId,
    pub owner_id: OwnerId,
    pub currency: Currency,
    pub status: AccountStatus,
    pub balance: i64,
    pub reserved_balance: i64,
    pub version: u64,
}

/// The single write path for balances.
pub struct LedgerStore<S, B> {
    store: S,
    bus: B,
    retry: RetryPolicy,
}

impl<S, B> LedgerStore<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(store: S, bus: B, retry: RetryPolicy) -> Self {
        Self { store, bus, retry }
    }

    pub fn open_account(
        &self,
        account_id: AccountId,
        owner_id: OwnerId,
        currency: Currency,
    ) -> LedgerResult<BalanceView> {
        let account = self.execute(
            account_id,
            AccountCommand::Open(OpenAccount {
                account_id,
                owner_id,
                currency,
                occurred_at: chrono::Utc::now(),
            }),
        )?;
        Self::view_of(&account)
    }

    /// Post one signed entry. Duplicate references return the original
    /// entry without appending anything.
    pub fn post(
        &self,
        account_id: AccountId,
        amount: i64,
        kind: EntryKind,
        reference: &str,
    ) -> LedgerResult<LedgerEntry> {
        let account = self.execute(
            account_id,
            AccountCommand::Post(PostEntry {
                entry_id: EntryId::new(),
                amount,
                kind,
                reference: reference.to_string(),
                occurred_at: chrono::Utc::now(),
            }),
        )?;

        // Covers both the fresh posting and the idempotent-duplicate case:
        // either way the entry under this reference is the answer.
        account
            .entry_by_reference(reference)
            .cloned()
            .ok_or_else(|| LedgerError::internal("posted entry missing from state"))
    }

    /// Append the equal-and-opposite entry for a prior posting. Safe to
    /// call repeatedly: only the first invocation moves money.
    pub fn reverse(
        &self,
        account_id: AccountId,
        original_entry_id: EntryId,
    ) -> LedgerResult<LedgerEntry> {
        let reference = reversal_reference(original_entry_id);
        let account = self.execute(
            account_id,
            AccountCommand::Reverse(ReverseEntry {
                entry_id: EntryId::new(),
                original_entry_id,
                reference: reference.clone(),
                occurred_at: chrono::Utc::now(),
            }),
        )?;

        account
            .entry_by_reference(&reference)
            .cloned()
            .ok_or_else(|| LedgerError::internal("reversal entry missing from state"))
    }

    pub fn reserve(
        &self,
        account_id: AccountId,
        amount: i64,
        reference: &str,
    ) -> LedgerResult<BalanceView> {
        let account = self.execute(
            account_id,
            AccountCommand::Reserve(ReserveFunds {
                amount,
                reference: reference.to_string(),
                occurred_at: chrono::Utc::now(),
            }),
        )?;
        Self::view_of(&account)
    }

    pub fn release(&self, account_id: AccountId, reference: &str) -> LedgerResult<BalanceView> {
        let account = self.execute(
            account_id,
            AccountCommand::Release(ReleaseReservation {
                reference: reference.to_string(),
                occurred_at: chrono::Utc::now(),
            }),
        )?;
        Self::view_of(&account)
    }

    pub fn freeze(&self, account_id: AccountId, reason: Option<String>) -> LedgerResult<()> {
        self.execute(
            account_id,
            AccountCommand::Freeze(FreezeAccount {
                reason,
                occurred_at: chrono::Utc::now(),
            }),
        )?;
        Ok(())
    }

    pub fn unfreeze(&self, account_id: AccountId) -> LedgerResult<()> {
        self.execute(
            account_id,
            AccountCommand::Unfreeze(UnfreezeAccount {
                occurred_at: chrono::Utc::now(),
            }),
        )?;
        Ok(())
    }

    pub fn close(&self, account_id: AccountId) -> LedgerResult<()> {
        self.execute(
            account_id,
            AccountCommand::Close(CloseAccount {
                occurred_at: chrono::Utc::now(),
            }),
        )?;
        Ok(())
    }

    /// Current balance snapshot.
    pub fn balance(&self, account_id: AccountId) -> LedgerResult<BalanceView> {
        let account = self.load(account_id)?;
        if !account.is_created() {
            return Err(LedgerError::NotFound);
        }
        Self::view_of(&account)
    }

    /// Full rehydrated aggregate, entries included.
    pub fn account(&self, account_id: AccountId) -> LedgerResult<Account> {
        let account = self.load(account_id)?;
        if !account.is_created() {
            return Err(LedgerError::NotFound);
        }
        Ok(account)
    }

    /// Run one command through the optimistic-concurrency loop, returning
    /// the post-command aggregate state.
    fn execute(&self, account_id: AccountId, command: AccountCommand) -> LedgerResult<Account> {
        let mut attempt = 1;
        loop {
            let mut account = self.load(account_id)?;
            let expected = ExpectedVersion::Exact(account.version());

            // Domain rejections propagate immediately: retrying cannot help
            // an insufficient-funds or frozen-account outcome.
            let events = account.handle(&command)?;
            if events.is_empty() {
                debug!(account_id = %account_id, "command resolved as no-op");
                return Ok(account);
            }

            let uncommitted = events
                .iter()
                .map(|e| {
                    UncommittedEvent::from_typed(account_id, AGGREGATE_TYPE, Uuid::now_v7(), e)
                })
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| LedgerError::internal(e.to_string()))?;

            match self.store.append(uncommitted, expected) {
                Ok(committed) => {
                    for event in &events {
                        account.apply(event);
                    }
                    self.publish(&committed);
                    return Ok(account);
                }
                Err(EventStoreError::Concurrency(detail)) => {
                    if attempt >= self.retry.max_attempts {
                        warn!(
                            account_id = %account_id,
                            attempts = attempt,
                            "giving up after repeated version conflicts"
                        );
                        return Err(LedgerError::conflict(detail));
                    }
                    debug!(
                        account_id = %account_id,
                        attempt,
                        "version conflict, retrying with fresh state"
                    );
                    std::thread::sleep(self.retry.backoff_for(attempt));
                    attempt += 1;
                }
                Err(other) => return Err(LedgerError::internal(other.to_string())),
            }
        }
    }

    fn load(&self, account_id: AccountId) -> LedgerResult<Account> {
        let stream = self
            .store
            .load_stream(account_id)
            .map_err(|e| LedgerError::internal(e.to_string()))?;

        Self::validate_stream(account_id, &stream)?;

        let mut account = Account::empty(account_id);
        for stored in &stream {
            let event: AccountEvent = serde_json::from_value(stored.payload.clone())
                .map_err(|e| LedgerError::internal(format!("corrupt event payload: {e}")))?;
            account.apply(&event);
        }
        Ok(account)
    }

    fn validate_stream(account_id: AccountId, stream: &[StoredEvent]) -> LedgerResult<()> {
        let mut last_seq = 0u64;
        for stored in stream {
            if stored.account_id != account_id {
                return Err(LedgerError::internal(format!(
                    "stream for {account_id} contains event for {}",
                    stored.account_id
                )));
            }
            if stored.sequence_number != last_seq + 1 {
                return Err(LedgerError::internal(format!(
                    "stream for {account_id} has gap at sequence {}",
                    stored.sequence_number
                )));
            }
            last_seq = stored.sequence_number;
        }
        Ok(())
    }

    /// The append is the commit point; a bus failure must not make the
    /// caller believe the posting failed, so it is logged and swallowed.
    fn publish(&self, committed: &[StoredEvent]) {
        for stored in committed {
            if let Err(e) = self.bus.publish(stored.to_envelope()) {
                warn!(
                    event_id = %stored.event_id,
                    account_id = %stored.account_id,
                    error = ?e,
                    "event committed but publication failed"
                );
            }
        }
    }

    fn view_of(account: &Account) -> LedgerResult<BalanceView> {
        let owner_id = account
            .owner_id()
            .ok_or_else(|| LedgerError::internal("created account missing owner"))?;
        let currency = account
            .currency()
            .ok_or_else(|| LedgerError::internal("created account missing currency"))?;

        Ok(BalanceView {
            account_id: account.id_typed(),
            owner_id,
            currency,
            status: account.status(),
            balance: account.balance(),
            reserved_balance: account.reserved_balance(),
            version: account.version(),
        })
    }
}
