use std::collections::HashMap;
use std::sync::RwLock;

use centavo_core::{LedgerError, LedgerResult, TransferId};
use centavo_transfers::{Transfer, TransferStore};

/// In-memory transfer records, indexed by id and by reference.
#[derive(Debug, Default)]
pub struct InMemoryTransferStore {
    by_id: RwLock<HashMap<TransferId, Transfer>>,
    by_reference: RwLock<HashMap<String, TransferId>>,
}

impl InMemoryTransferStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransferStore for InMemoryTransferStore {
    fn save(&self, transfer: &Transfer) -> LedgerResult<()> {
        let mut by_id = self
            .by_id
            .write()
            .map_err(|_| LedgerError::internal("transfer store lock poisoned"))?;
        let mut by_reference = self
            .by_reference
            .write()
            .map_err(|_| LedgerError::internal("transfer store lock poisoned"))?;

        // A reference maps to exactly one transfer, forever.
        if let Some(existing) = by_reference.get(&transfer.reference)
            && *existing != transfer.transfer_id
        {
            return Err(LedgerError::conflict(format!(
                "reference {} already belongs to another transfer",
                transfer.reference
            )));
        }

        by_reference.insert(transfer.reference.clone(), transfer.transfer_id);
        by_id.insert(transfer.transfer_id, transfer.clone());
        Ok(())
    }

    fn get(&self, transfer_id: TransferId) -> LedgerResult<Option<Transfer>> {
        let by_id = self
            .by_id
            .read()
            .map_err(|_| LedgerError::internal("transfer store lock poisoned"))?;
        Ok(by_id.get(&transfer_id).cloned())
    }

    fn find_by_reference(&self, reference: &str) -> LedgerResult<Option<Transfer>> {
        let by_reference = self
            .by_reference
            .read()
            .map_err(|_| LedgerError::internal("transfer store lock poisoned"))?;
        let Some(id) = by_reference.get(reference) else {
            return Ok(None);
        };
        let by_id = self
            .by_id
            .read()
            .map_err(|_| LedgerError::internal("transfer store lock poisoned"))?;
        Ok(by_id.get(id).cloned())
    }
}
