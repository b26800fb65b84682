use std::collections::HashMap;
use std::sync::Mutex;

use centavo_core::{AccountId, InstrumentId, LedgerError, LedgerResult};
use centavo_trading::{Holding, HoldingsStore};

/// In-memory holdings store.
///
/// One mutex guards the whole map; `update` runs its closure under that
/// lock, so the quantity check and the mutation cannot interleave with a
/// concurrent trade on the same position.
#[derive(Debug, Default)]
pub struct InMemoryHoldingsStore {
    positions: Mutex<HashMap<(AccountId, InstrumentId), Holding>>,
}

impl InMemoryHoldingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HoldingsStore for InMemoryHoldingsStore {
    fn get(
        &self,
        account_id: AccountId,
        instrument_id: &InstrumentId,
    ) -> LedgerResult<Option<Holding>> {
        let positions = self
            .positions
            .lock()
            .map_err(|_| LedgerError::internal("holdings lock poisoned"))?;

        Ok(positions
            .get(&(account_id, instrument_id.clone()))
            .cloned())
    }

    fn holdings_for(&self, account_id: AccountId) -> LedgerResult<Vec<Holding>> {
        let positions = self
            .positions
            .lock()
            .map_err(|_| LedgerError::internal("holdings lock poisoned"))?;

        let mut holdings: Vec<Holding> = positions
            .values()
            .filter(|h| h.account_id == account_id)
            .cloned()
            .collect();
        holdings.sort_by(|a, b| a.instrument_id.as_str().cmp(b.instrument_id.as_str()));
        Ok(holdings)
    }

    fn update(
        &self,
        account_id: AccountId,
        instrument_id: &InstrumentId,
        mutate: &mut dyn FnMut(&mut Holding) -> LedgerResult<()>,
    ) -> LedgerResult<Holding> {
        let mut positions = self
            .positions
            .lock()
            .map_err(|_| LedgerError::internal("holdings lock poisoned"))?;

        let key = (account_id, instrument_id.clone());
        let mut holding = positions
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Holding::empty(account_id, instrument_id.clone()));

        mutate(&mut holding)?;

        // An emptied position is dropped, never left with a stale price.
        if holding.is_empty() {
            positions.remove(&key);
        } else {
            positions.insert(key, holding.clone());
        }
        Ok(holding)
    }
}
