use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::info;

use centavo_core::{
    AccountId, Currency, LedgerError, LedgerResult, OwnerId, ReferenceGenerator,
};
use centavo_events::{EventBus, EventEnvelope, EventStore};
use centavo_ledger::{AccountStatus, BalanceView, EntryKind, LedgerEntry, LedgerStore};

use crate::directory::WalletDirectory;

/// Client-facing snapshot of a wallet account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountView {
    pub account_id: AccountId,
    pub owner_id: OwnerId,
    pub currency: Currency,
    pub status: AccountStatus,
    pub balance: i64,
    pub reserved_balance: i64,
    pub version: u64,
}

impl From<BalanceView> for AccountView {
    fn from(view: BalanceView) -> Self {
        Self {
            account_id: view.account_id,
            owner_id: view.owner_id,
            currency: view.currency,
            status: view.status,
            balance: view.balance,
            reserved_balance: view.reserved_balance,
            version: view.version,
        }
    }
}

/// Wallet lifecycle operations.
pub struct WalletAccountService<S, B, D> {
    ledger: LedgerStore<S, B>,
    directory: D,
    deposit_refs: ReferenceGenerator,
}

impl<S, B, D> WalletAccountService<S, B, D>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    D: WalletDirectory,
{
    pub fn new(ledger: LedgerStore<S, B>, directory: D) -> Self {
        Self {
            ledger,
            directory,
            deposit_refs: ReferenceGenerator::new("DEP"),
        }
    }

    pub fn ledger(&self) -> &LedgerStore<S, B> {
        &self.ledger
    }

    /// Open a wallet for an owner. One account per call; an owner may hold
    /// several wallets in different currencies.
    pub fn create_wallet(&self, owner_id: OwnerId, currency: Currency) -> LedgerResult<AccountView> {
        let account_id = AccountId::new();
        let view = self.ledger.open_account(account_id, owner_id, currency)?;
        self.directory.register(owner_id, account_id)?;

        info!(
            account_id = %account_id,
            owner_id = %owner_id,
            currency = %currency,
            "wallet created"
        );
        Ok(view.into())
    }

    /// Credit external funds into a wallet. The reference is the funding
    /// rail's idempotency key; pass `None` to have one generated.
    pub fn deposit(
        &self,
        account_id: AccountId,
        amount: i64,
        reference: Option<&str>,
    ) -> LedgerResult<LedgerEntry> {
        if amount <= 0 {
            return Err(LedgerError::invalid_argument(
                "deposit amount must be positive",
            ));
        }

        let reference = match reference {
            Some(r) => r.to_string(),
            None => self.deposit_refs.generate(),
        };
        self.ledger
            .post(account_id, amount, EntryKind::Deposit, &reference)
    }

    pub fn wallet(&self, account_id: AccountId) -> LedgerResult<AccountView> {
        Ok(self.ledger.balance(account_id)?.into())
    }

    /// All wallets owned by `owner_id`.
    pub fn wallets_for(&self, owner_id: OwnerId) -> LedgerResult<Vec<AccountView>> {
        let mut views = Vec::new();
        for account_id in self.directory.accounts_for(owner_id)? {
            views.push(self.ledger.balance(account_id)?.into());
        }
        Ok(views)
    }

    /// Entry history for a wallet, oldest first.
    pub fn statement(&self, account_id: AccountId) -> LedgerResult<Vec<LedgerEntry>> {
        Ok(self.ledger.account(account_id)?.entries().to_vec())
    }

    /// Place a hold: move `amount` from available into reserved under the
    /// hold's reference. Held funds stay on the account but cannot be
    /// spent until released.
    pub fn reserve(
        &self,
        account_id: AccountId,
        amount: i64,
        reference: &str,
    ) -> LedgerResult<AccountView> {
        let view = self.ledger.reserve(account_id, amount, reference)?;
        info!(account_id = %account_id, amount, reference, "funds reserved");
        Ok(view.into())
    }

    /// Return a held amount to the available balance.
    pub fn release(&self, account_id: AccountId, reference: &str) -> LedgerResult<AccountView> {
        let view = self.ledger.release(account_id, reference)?;
        info!(account_id = %account_id, reference, "reservation released");
        Ok(view.into())
    }

    /// Compliance gate: block outbound postings.
    pub fn freeze(&self, account_id: AccountId, reason: Option<String>) -> LedgerResult<()> {
        self.ledger.freeze(account_id, reason)?;
        info!(account_id = %account_id, "wallet frozen");
        Ok(())
    }

    pub fn unfreeze(&self, account_id: AccountId) -> LedgerResult<()> {
        self.ledger.unfreeze(account_id)?;
        info!(account_id = %account_id, "wallet unfrozen");
        Ok(())
    }

    /// Close an emptied wallet. Accounts are never deleted.
    pub fn close(&self, account_id: AccountId) -> LedgerResult<()> {
        self.ledger.close(account_id)?;
        info!(account_id = %account_id, "wallet closed");
        Ok(())
    }
}
