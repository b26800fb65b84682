//! Balances projection.
//!
//! A denormalized per-account balance view rebuilt from the entry stream,
//! for dashboards and support tooling. The ledger aggregate stays the
//! source of truth; this view is eventually consistent.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use centavo_core::AccountId;
use centavo_events::EventEnvelope;
use centavo_ledger::{AccountEvent, AccountStatus};

/// Read model: one account's balance as seen by the projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceReadModel {
    pub account_id: AccountId,
    pub balance: i64,
    pub reserved_balance: i64,
    pub status: AccountStatus,
    pub entry_count: u64,
    /// Stream position this view reflects.
    pub last_sequence: u64,
}

impl BalanceReadModel {
    fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            balance: 0,
            reserved_balance: 0,
            status: AccountStatus::Active,
            entry_count: 0,
            last_sequence: 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum BalancesProjectionError {
    #[error("failed to deserialize account event: {0}")]
    Deserialize(String),

    #[error("lock poisoned")]
    Poisoned,
}

/// Balances projection with a per-account cursor.
///
/// Delivery from the bus is at-least-once; the cursor makes replays and
/// duplicates harmless.
#[derive(Debug, Default)]
pub struct BalancesProjection {
    balances: RwLock<HashMap<AccountId, BalanceReadModel>>,
}

impl BalancesProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), BalancesProjectionError> {
        let event: AccountEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| BalancesProjectionError::Deserialize(e.to_string()))?;

        let mut balances = self
            .balances
            .write()
            .map_err(|_| BalancesProjectionError::Poisoned)?;

        let model = balances
            .entry(envelope.account_id())
            .or_insert_with(|| BalanceReadModel::new(envelope.account_id()));

        // Cursor check: drop anything at or behind the view.
        if envelope.sequence_number() <= model.last_sequence {
            return Ok(());
        }

        match event {
            AccountEvent::AccountOpened { .. } => {
                model.status = AccountStatus::Active;
            }
            AccountEvent::EntryPosted { entry } => {
                model.balance = entry.balance_after;
                model.entry_count += 1;
            }
            AccountEvent::FundsReserved { amount, .. } => {
                model.balance -= amount;
                model.reserved_balance += amount;
            }
            AccountEvent::ReservationReleased { amount, .. } => {
                model.balance += amount;
                model.reserved_balance -= amount;
            }
            AccountEvent::AccountFrozen { .. } => {
                model.status = AccountStatus::Frozen;
            }
            AccountEvent::AccountUnfrozen { .. } => {
                model.status = AccountStatus::Active;
            }
            AccountEvent::AccountClosed { .. } => {
                model.status = AccountStatus::Closed;
            }
        }
        model.last_sequence = envelope.sequence_number();
        Ok(())
    }

    pub fn get(&self, account_id: AccountId) -> Option<BalanceReadModel> {
        self.balances
            .read()
            .ok()
            .and_then(|b| b.get(&account_id).cloned())
    }
}
