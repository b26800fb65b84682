use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{error, info};

use centavo_core::{
    AccountId, EntryId, InstrumentId, LedgerError, LedgerResult, Notification, NotificationKind,
    NotificationSink, ReferenceGenerator, TradeId,
};
use centavo_events::{EventBus, EventEnvelope, EventStore};
use centavo_ledger::{EntryKind, LedgerStore};

use crate::holding::{Holding, HoldingsStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// The record of one executed trade.
///
/// `total` is the cash leg in minor units; `realized_pnl` is reported on
/// sells only and never feeds back into the remaining cost basis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trade {
    pub trade_id: TradeId,
    pub account_id: AccountId,
    pub instrument_id: InstrumentId,
    pub side: TradeSide,
    pub quantity: Decimal,
    pub price: i64,
    pub total: i64,
    pub realized_pnl: Option<i64>,
    pub entry_id: EntryId,
    pub reference: String,
    pub executed_at: DateTime<Utc>,
}

/// Executes buys and sells: one ledger posting plus one holding mutation
/// per trade, with the posting reversed if the holding side fails.
pub struct TradeExecutionEngine<S, B, H, N> {
    ledger: LedgerStore<S, B>,
    holdings: H,
    notifications: N,
    trade_refs: ReferenceGenerator,
}

impl<S, B, H, N> TradeExecutionEngine<S, B, H, N>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    H: HoldingsStore,
    N: NotificationSink,
{
    pub fn new(ledger: LedgerStore<S, B>, holdings: H, notifications: N) -> Self {
        Self {
            ledger,
            holdings,
            notifications,
            trade_refs: ReferenceGenerator::new("TRD"),
        }
    }

    pub fn buy(
        &self,
        account_id: AccountId,
        instrument_id: InstrumentId,
        quantity: Decimal,
        price: i64,
    ) -> LedgerResult<Trade> {
        let total = Self::validate(quantity, price)?;
        let reference = self.trade_refs.generate();

        // Cash leg first: the debit carries the funds check.
        let entry = self
            .ledger
            .post(account_id, -total, EntryKind::Trade, &reference)?;

        let price_dec = Decimal::from(price);
        let updated = self.holdings.update(account_id, &instrument_id, &mut |h| {
            h.record_buy(quantity, price_dec)
        });

        if let Err(holding_err) = updated {
            self.compensate(account_id, entry.entry_id, &holding_err);
            return Err(LedgerError::internal(format!(
                "holding update failed after debit, entry reversed: {holding_err}"
            )));
        }

        let trade = Trade {
            trade_id: TradeId::new(),
            account_id,
            instrument_id,
            side: TradeSide::Buy,
            quantity,
            price,
            total,
            realized_pnl: None,
            entry_id: entry.entry_id,
            reference,
            executed_at: entry.created_at,
        };
        self.record(&trade);
        Ok(trade)
    }

    pub fn sell(
        &self,
        account_id: AccountId,
        instrument_id: InstrumentId,
        quantity: Decimal,
        price: i64,
    ) -> LedgerResult<Trade> {
        let total = Self::validate(quantity, price)?;

        // Early position check saves a posting for the common rejection,
        // but the authoritative check re-runs inside `update`.
        let held = self
            .holdings
            .get(account_id, &instrument_id)?
            .map(|h| h.quantity)
            .unwrap_or(Decimal::ZERO);
        if quantity > held {
            return Err(LedgerError::InsufficientPosition {
                held: held.to_string(),
                requested: quantity.to_string(),
            });
        }

        let reference = self.trade_refs.generate();
        let entry = self
            .ledger
            .post(account_id, total, EntryKind::Trade, &reference)?;

        let mut cost_basis = Decimal::ZERO;
        let updated = self.holdings.update(account_id, &instrument_id, &mut |h| {
            cost_basis = h.average_cost;
            h.record_sell(quantity)
        });

        if let Err(holding_err) = updated {
            self.compensate(account_id, entry.entry_id, &holding_err);
            // A concurrent sell can still win the position between the
            // early check and here; surface that as the domain error.
            return match holding_err {
                e @ LedgerError::InsufficientPosition { .. } => Err(e),
                other => Err(LedgerError::internal(format!(
                    "holding update failed after credit, entry reversed: {other}"
                ))),
            };
        }

        let realized_pnl = Self::to_minor(quantity * (Decimal::from(price) - cost_basis))?;
        let trade = Trade {
            trade_id: TradeId::new(),
            account_id,
            instrument_id,
            side: TradeSide::Sell,
            quantity,
            price,
            total,
            realized_pnl: Some(realized_pnl),
            entry_id: entry.entry_id,
            reference,
            executed_at: entry.created_at,
        };
        self.record(&trade);
        Ok(trade)
    }

    /// Current portfolio for an account.
    pub fn positions(&self, account_id: AccountId) -> LedgerResult<Vec<Holding>> {
        self.holdings.holdings_for(account_id)
    }

    fn validate(quantity: Decimal, price: i64) -> LedgerResult<i64> {
        if quantity <= Decimal::ZERO {
            return Err(LedgerError::invalid_argument("quantity must be positive"));
        }
        if price <= 0 {
            return Err(LedgerError::invalid_argument("price must be positive"));
        }

        let total = Self::to_minor(quantity * Decimal::from(price))?;
        if total == 0 {
            return Err(LedgerError::invalid_argument(
                "trade value rounds to zero minor units",
            ));
        }
        Ok(total)
    }

    fn to_minor(amount: Decimal) -> LedgerResult<i64> {
        amount
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .ok_or_else(|| LedgerError::internal("trade amount out of range"))
    }

    fn compensate(&self, account_id: AccountId, entry_id: EntryId, cause: &LedgerError) {
        match self.ledger.reverse(account_id, entry_id) {
            Ok(reversal) => info!(
                account_id = %account_id,
                entry_id = %entry_id,
                reversal_id = %reversal.entry_id,
                cause = %cause,
                "trade posting reversed"
            ),
            Err(e) => error!(
                account_id = %account_id,
                entry_id = %entry_id,
                cause = %cause,
                error = %e,
                "trade posting could not be reversed, manual reconciliation required"
            ),
        }
    }

    fn record(&self, trade: &Trade) {
        info!(
            trade_id = %trade.trade_id,
            account_id = %trade.account_id,
            instrument_id = %trade.instrument_id,
            side = ?trade.side,
            total = trade.total,
            "trade recorded"
        );
        self.notifications.notify(Notification::new(
            trade.account_id,
            NotificationKind::TradeExecuted,
            trade.reference.clone(),
            format!(
                "{:?} {} {} at {}",
                trade.side, trade.quantity, trade.instrument_id, trade.price
            ),
        ));
    }
}
