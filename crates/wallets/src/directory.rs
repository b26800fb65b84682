use std::sync::Arc;

use centavo_core::{AccountId, LedgerResult, OwnerId};

/// Owner → accounts index.
///
/// The ledger is keyed by account; clients ask by owner. The in-memory
/// backend lives in `centavo-infra`.
pub trait WalletDirectory: Send + Sync {
    fn register(&self, owner_id: OwnerId, account_id: AccountId) -> LedgerResult<()>;

    /// All accounts registered for an owner, in registration order.
    fn accounts_for(&self, owner_id: OwnerId) -> LedgerResult<Vec<AccountId>>;
}

impl<D> WalletDirectory for Arc<D>
where
    D: WalletDirectory + ?Sized,
{
    fn register(&self, owner_id: OwnerId, account_id: AccountId) -> LedgerResult<()> {
        (**self).register(owner_id, account_id)
    }

    fn accounts_for(&self, owner_id: OwnerId) -> LedgerResult<Vec<AccountId>> {
        (**self).accounts_for(owner_id)
    }
}
