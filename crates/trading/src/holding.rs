use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use centavo_core::{AccountId, InstrumentId, LedgerError, LedgerResult};

/// A position in one tradable instrument.
///
/// `average_cost` is the quantity-weighted average purchase price in minor
/// units, kept as an exact decimal so repeated buys never accumulate
/// rounding drift. A fully sold position is cleared to zero on both
/// fields, never left with a stale price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub account_id: AccountId,
    pub instrument_id: InstrumentId,
    pub quantity: Decimal,
    pub average_cost: Decimal,
}

impl Holding {
    pub fn empty(account_id: AccountId, instrument_id: InstrumentId) -> Self {
        Self {
            account_id,
            instrument_id,
            quantity: Decimal::ZERO,
            average_cost: Decimal::ZERO,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.quantity.is_zero()
    }

    /// Fold a purchase into the position.
    ///
    /// `new_avg = (old_qty * old_avg + qty * price) / (old_qty + qty)`
    pub fn record_buy(&mut self, quantity: Decimal, price: Decimal) -> LedgerResult<()> {
        if quantity <= Decimal::ZERO {
            return Err(LedgerError::invalid_argument("quantity must be positive"));
        }

        let new_quantity = self.quantity + quantity;
        self.average_cost =
            (self.quantity * self.average_cost + quantity * price) / new_quantity;
        self.quantity = new_quantity;
        Ok(())
    }

    /// Reduce the position on sale. Average cost of the remainder is
    /// unchanged; a position sold to zero is cleared entirely.
    pub fn record_sell(&mut self, quantity: Decimal) -> LedgerResult<()> {
        if quantity <= Decimal::ZERO {
            return Err(LedgerError::invalid_argument("quantity must be positive"));
        }
        if quantity > self.quantity {
            return Err(LedgerError::InsufficientPosition {
                held: self.quantity.to_string(),
                requested: quantity.to_string(),
            });
        }

        self.quantity -= quantity;
        if self.quantity.is_zero() {
            self.average_cost = Decimal::ZERO;
        }
        Ok(())
    }
}

/// Keyed store for holdings: `(account, instrument)` → position.
///
/// `update` runs the mutation under the store's own exclusion for that key,
/// so a concurrent sell cannot pass a stale quantity check. The closure
/// sees the current position (empty if absent); if it leaves the position
/// empty the store drops the row.
pub trait HoldingsStore: Send + Sync {
    fn get(
        &self,
        account_id: AccountId,
        instrument_id: &InstrumentId,
    ) -> LedgerResult<Option<Holding>>;

    fn holdings_for(&self, account_id: AccountId) -> LedgerResult<Vec<Holding>>;

    fn update(
        &self,
        account_id: AccountId,
        instrument_id: &InstrumentId,
        mutate: &mut dyn FnMut(&mut Holding) -> LedgerResult<()>,
    ) -> LedgerResult<Holding>;
}

impl<H> HoldingsStore for Arc<H>
where
    H: HoldingsStore + ?Sized,
{
    fn get(
        &self,
        account_id: AccountId,
        instrument_id: &InstrumentId,
    ) -> LedgerResult<Option<Holding>> {
        (**self).get(account_id, instrument_id)
    }

    fn holdings_for(&self, account_id: AccountId) -> LedgerResult<Vec<Holding>> {
        (**self).holdings_for(account_id)
    }

    fn update(
        &self,
        account_id: AccountId,
        instrument_id: &InstrumentId,
        mutate: &mut dyn FnMut(&mut Holding) -> LedgerResult<()>,
    ) -> LedgerResult<Holding> {
        (**self).update(account_id, instrument_id, mutate)
    }
}
