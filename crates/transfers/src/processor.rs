use chrono::{Duration, Utc};
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use centavo_core::{
    AccountId, FeePolicy, LedgerError, LedgerResult, Limits, Notification, NotificationKind,
    NotificationSink, ReferenceGenerator,
};
use centavo_events::{EventBus, EventEnvelope, EventStore};
use centavo_ledger::{EntryKind, LedgerStore};

use crate::transfer::{Transfer, TransferState, TransferStore};

/// Orchestrates peer-to-peer transfers: debit sender, credit recipient,
/// reverse the debit if the credit side fails.
pub struct TransferProcessor<S, B, T, N> {
    ledger: LedgerStore<S, B>,
    transfers: T,
    notifications: N,
    fees: FeePolicy,
    limits: Limits,
    transfer_refs: ReferenceGenerator,
}

impl<S, B, T, N> TransferProcessor<S, B, T, N>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    T: TransferStore,
    N: NotificationSink,
{
    pub fn new(
        ledger: LedgerStore<S, B>,
        transfers: T,
        notifications: N,
        fees: FeePolicy,
        limits: Limits,
    ) -> Self {
        Self {
            ledger,
            transfers,
            notifications,
            fees,
            limits,
            transfer_refs: ReferenceGenerator::new("TRF"),
        }
    }

    /// Send `amount` from one wallet to another. Re-invoking with the same
    /// reference is safe: a terminal transfer is returned as-is, and a
    /// partially advanced one is resumed from where it stopped.
    pub fn transfer(
        &self,
        sender_account_id: AccountId,
        recipient_account_id: AccountId,
        amount: i64,
        reference: Option<&str>,
    ) -> LedgerResult<Transfer> {
        if amount <= 0 {
            return Err(LedgerError::invalid_argument("amount must be positive"));
        }
        if sender_account_id == recipient_account_id {
            return Err(LedgerError::invalid_argument(
                "sender and recipient must differ",
            ));
        }
        if amount > self.limits.per_transaction_max {
            return Err(LedgerError::limit_exceeded(format!(
                "amount {amount} exceeds per-transaction limit {}",
                self.limits.per_transaction_max
            )));
        }

        let reference = match reference {
            Some(r) => r.to_string(),
            None => self.transfer_refs.generate(),
        };

        let mut transfer = match self.transfers.find_by_reference(&reference)? {
            // Terminal records are immutable audit data; the retry just
            // gets told what already happened.
            Some(existing) if existing.state.is_terminal() => return Ok(existing),
            Some(existing) => existing,
            None => {
                let fee = self.fees.fee_for(amount);
                let outgoing = amount
                    .checked_add(fee)
                    .ok_or_else(|| LedgerError::internal("debit amount overflow"))?;
                self.check_day_limit(sender_account_id, outgoing)?;
                let t = Transfer::new(
                    sender_account_id,
                    recipient_account_id,
                    amount,
                    fee,
                    reference.clone(),
                );
                self.transfers.save(&t)?;
                t
            }
        };

        // Debit side. Idempotent on the reference, so a resumed transfer
        // that already debited gets its original entry back.
        if transfer.state == TransferState::Pending {
            let debit_total = transfer
                .amount
                .checked_add(transfer.fee)
                .ok_or_else(|| LedgerError::internal("debit amount overflow"))?;

            let debit = match self.ledger.post(
                transfer.sender_account_id,
                -debit_total,
                EntryKind::TransferOut,
                &transfer.reference,
            ) {
                Ok(entry) => entry,
                Err(e) => {
                    // Nothing moved; the record fails in place.
                    transfer.transition(TransferState::Failed)?;
                    self.transfers.save(&transfer)?;
                    return Err(e);
                }
            };

            transfer.debit_entry_id = Some(debit.entry_id);
            transfer.transition(TransferState::Debited)?;
            self.transfers.save(&transfer)?;
        }

        // Credit side, same reference on the recipient's stream.
        match self.ledger.post(
            transfer.recipient_account_id,
            transfer.amount,
            EntryKind::TransferIn,
            &transfer.reference,
        ) {
            Ok(credit) => {
                transfer.credit_entry_id = Some(credit.entry_id);
                transfer.transition(TransferState::Completed)?;
                self.transfers.save(&transfer)?;
                self.notify_completed(&transfer);
                Ok(transfer)
            }
            Err(credit_err) => {
                self.reverse_debit(&mut transfer, &credit_err)?;
                self.notifications.notify(Notification::new(
                    transfer.sender_account_id,
                    NotificationKind::TransferReversed,
                    transfer.reference.clone(),
                    "transfer could not be delivered, your money was returned",
                ));

                match credit_err {
                    LedgerError::NotFound
                    | LedgerError::AccountFrozen
                    | LedgerError::AccountClosed => Err(LedgerError::recipient_unavailable(
                        format!("recipient cannot receive funds: {credit_err}"),
                    )),
                    other => Err(other),
                }
            }
        }
    }

    pub fn find_by_reference(&self, reference: &str) -> LedgerResult<Option<Transfer>> {
        self.transfers.find_by_reference(reference)
    }

    /// Rolling-day outbound ceiling. Checked against the sender's stream
    /// before a new transfer record is admitted; reversed debits do not
    /// count against the window.
    fn check_day_limit(&self, account_id: AccountId, outgoing: i64) -> LedgerResult<()> {
        let account = self.ledger.account(account_id)?;
        let window_start = Utc::now() - Duration::hours(24);
        let spent = account.outbound_since(window_start);
        if spent.saturating_add(outgoing) > self.limits.per_day_max {
            return Err(LedgerError::limit_exceeded(format!(
                "daily outbound limit {} reached ({spent} already sent)",
                self.limits.per_day_max
            )));
        }
        Ok(())
    }

    fn reverse_debit(&self, transfer: &mut Transfer, cause: &LedgerError) -> LedgerResult<()> {
        let debit_entry_id = transfer
            .debit_entry_id
            .ok_or_else(|| LedgerError::internal("debited transfer missing debit entry"))?;

        match self
            .ledger
            .reverse(transfer.sender_account_id, debit_entry_id)
        {
            Ok(reversal) => {
                info!(
                    transfer_id = %transfer.transfer_id,
                    reversal_id = %reversal.entry_id,
                    cause = %cause,
                    "sender debit reversed"
                );
                transfer.transition(TransferState::Reversed)?;
                self.transfers.save(transfer)
            }
            Err(e) => {
                // Debit stands and the record stays `debited`; a retry of
                // the same reference resumes from here.
                warn!(
                    transfer_id = %transfer.transfer_id,
                    error = %e,
                    cause = %cause,
                    "debit reversal failed, transfer left for retry"
                );
                Err(LedgerError::internal(format!(
                    "credit failed and reversal did not land: {e}"
                )))
            }
        }
    }

    fn notify_completed(&self, transfer: &Transfer) {
        info!(
            transfer_id = %transfer.transfer_id,
            sender = %transfer.sender_account_id,
            recipient = %transfer.recipient_account_id,
            amount = transfer.amount,
            fee = transfer.fee,
            "transfer completed"
        );
        self.notifications.notify(Notification::new(
            transfer.sender_account_id,
            NotificationKind::TransferCompleted,
            transfer.reference.clone(),
            format!("you sent {}", transfer.amount),
        ));
        self.notifications.notify(Notification::new(
            transfer.recipient_account_id,
            NotificationKind::MoneyReceived,
            transfer.reference.clone(),
            format!("you received {}", transfer.amount),
        ));
    }
}
