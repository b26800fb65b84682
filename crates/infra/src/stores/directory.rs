use std::collections::HashMap;
use std::sync::RwLock;

use centavo_core::{AccountId, LedgerError, LedgerResult, OwnerId};
use centavo_wallets::WalletDirectory;

/// In-memory owner → accounts index.
#[derive(Debug, Default)]
pub struct InMemoryWalletDirectory {
    by_owner: RwLock<HashMap<OwnerId, Vec<AccountId>>>,
}

impl InMemoryWalletDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WalletDirectory for InMemoryWalletDirectory {
    fn register(&self, owner_id: OwnerId, account_id: AccountId) -> LedgerResult<()> {
        let mut by_owner = self
            .by_owner
            .write()
            .map_err(|_| LedgerError::internal("wallet directory lock poisoned"))?;

        let accounts = by_owner.entry(owner_id).or_default();
        if !accounts.contains(&account_id) {
            accounts.push(account_id);
        }
        Ok(())
    }

    fn accounts_for(&self, owner_id: OwnerId) -> LedgerResult<Vec<AccountId>> {
        let by_owner = self
            .by_owner
            .read()
            .map_err(|_| LedgerError::internal("wallet directory lock poisoned"))?;

        Ok(by_owner.get(&owner_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_is_idempotent_and_ordered() {
        let directory = InMemoryWalletDirectory::new();
        let owner = OwnerId::new();
        let first = AccountId::new();
        let second = AccountId::new();

        directory.register(owner, first).unwrap();
        directory.register(owner, second).unwrap();
        directory.register(owner, first).unwrap();

        assert_eq!(directory.accounts_for(owner).unwrap(), vec![first, second]);
        assert!(directory.accounts_for(OwnerId::new()).unwrap().is_empty());
    }
}
